//! Tipos de erro para o cliente HTTP do backend.
//!
//! Define [`BackendError`] com variantes para credencial expirada, respostas
//! HTTP de erro, corpos malformados e falhas de rede.

use thiserror::Error;

/// Erros que podem ocorrer ao conversar com o backend de processamento.
#[derive(Debug, Error)]
pub enum BackendError {
    /// O backend recusou o token (HTTP 401). O chamador deve renovar a sessão.
    #[error("unauthorized: the session token was rejected")]
    Unauthorized,

    /// Qualquer outra resposta fora da faixa 2xx.
    #[error("backend returned status {status}: {message}")]
    Status { status: u16, message: String },

    /// A resposta chegou mas o corpo não tinha o formato esperado.
    #[error("malformed response body: {0}")]
    Decode(String),

    /// Falha na camada de rede (DNS, conexão recusada, timeout).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl BackendError {
    /// `true` para falhas de transporte que expiraram por timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, BackendError::Network(e) if e.is_timeout())
    }
}
