//! Tipos de dados trocados com o backend de processamento de pedidos.
//!
//! O backend às vezes envia identificadores como inteiros e às vezes como
//! strings; [`JobId`] aceita os dois formatos e sempre os trata como texto
//! opaco. As respostas usam `#[serde(default)]` nos campos opcionais para
//! tolerar versões do backend que omitem contadores.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

/// Identificador opaco atribuído pelo backend a um arquivo enviado.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Formato bruto aceito na desserialização: número ou string.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(u64),
    Text(String),
}

impl<'de> Deserialize<'de> for JobId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match RawId::deserialize(deserializer)? {
            RawId::Number(n) => JobId(n.to_string()),
            RawId::Text(s) => JobId(s),
        })
    }
}

/// Arquivo de exportação de chat a ser enviado para processamento.
#[derive(Debug, Clone)]
pub struct Upload {
    /// Nome do arquivo enviado no formulário multipart.
    pub file_name: String,
    /// Conteúdo bruto do arquivo.
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    /// Lê o arquivo do disco, usando o último componente do caminho como nome.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload.txt")
            .to_string();
        Ok(Self { file_name, bytes })
    }

    /// Extensão do arquivo em minúsculas, sem o ponto.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }
}

/// Corpo retornado pelo endpoint de upload.
///
/// Algumas versões do backend embrulham o registro criado em `data`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum UploadResponse {
    Wrapped { data: UploadedFile },
    Flat(UploadedFile),
}

impl UploadResponse {
    pub fn into_id(self) -> JobId {
        match self {
            UploadResponse::Wrapped { data } => data.id,
            UploadResponse::Flat(file) => file.id,
        }
    }
}

/// Registro mínimo de um arquivo de chat recém-criado.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadedFile {
    pub id: JobId,
}

/// Estado de processamento de um arquivo de chat, conforme `GET chatfiles/{id}/`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    /// `true` quando o backend terminou de processar o arquivo.
    #[serde(default)]
    pub is_processed: bool,
    /// Mensagem de erro quando o processamento falhou; `null` caso contrário.
    #[serde(default)]
    pub processing_error: Option<String>,
    /// Total de mensagens lidas do chat.
    #[serde(default)]
    pub total_messages: Option<u64>,
    /// Total de pedidos extraídos.
    #[serde(default)]
    pub total_orders: Option<u64>,
}

impl StatusResponse {
    /// Mensagem de erro de processamento, ignorando strings vazias.
    pub fn error_message(&self) -> Option<&str> {
        self.processing_error
            .as_deref()
            .map(str::trim)
            .filter(|msg| !msg.is_empty())
    }
}

/// Planilha gerada pelo backend a partir de um chat processado.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedFile {
    pub id: JobId,
    /// Identificador do arquivo de chat de origem.
    pub chatfile: JobId,
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub total_messages: Option<u64>,
    #[serde(default)]
    pub total_orders: Option<u64>,
}

/// Listagem de arquivos processados: paginada (`results`) ou lista simples.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ProcessedFileList {
    Paged { results: Vec<ProcessedFile> },
    Bare(Vec<ProcessedFile>),
}

impl ProcessedFileList {
    pub fn into_files(self) -> Vec<ProcessedFile> {
        match self {
            ProcessedFileList::Paged { results } => results,
            ProcessedFileList::Bare(files) => files,
        }
    }
}
