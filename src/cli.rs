//! Interface de linha de comando do orderflow baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (upload, watch, status,
//! download) e flags globais que sobrescrevem a configuração.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// orderflow: envia exportações de chat e acompanha o processamento de pedidos.
#[derive(Debug, Parser)]
#[command(name = "orderflow", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Caminho para o arquivo de configuração (padrão: ./orderflow.toml).
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// URL base da API do backend.
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Token de sessão para o cabeçalho Authorization.
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Intervalo entre consultas de status, em segundos.
    #[arg(long, global = true)]
    pub interval: Option<u64>,

    /// Número máximo de consultas antes do timeout.
    #[arg(long, global = true)]
    pub max_attempts: Option<u32>,

    /// Imprime o relatório final em JSON em vez da barra de progresso.
    #[arg(long, global = true, default_value_t = false)]
    pub json: bool,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Envia um arquivo de chat e acompanha o processamento até o fim.
    Upload {
        /// Arquivo de exportação do WhatsApp (.txt).
        file: PathBuf,

        /// Apenas envia e inicia o processamento, sem acompanhar.
        #[arg(long, default_value_t = false)]
        no_wait: bool,
    },

    /// Acompanha um job já enviado até o fim.
    Watch {
        /// Identificador do arquivo de chat no backend.
        id: String,
    },

    /// Consulta o status atual de um job uma única vez.
    Status {
        /// Identificador do arquivo de chat no backend.
        id: String,
    },

    /// Baixa a planilha gerada para um job processado.
    Download {
        /// Identificador do arquivo de chat no backend.
        id: String,

        /// Caminho de saída (padrão: nome informado pelo backend).
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}
