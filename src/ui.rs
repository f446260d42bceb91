//! Interface de terminal do orderflow: barra de progresso e saída colorida.
//!
//! Usa as crates `indicatif` para a barra de progresso e `console` para
//! estilização com cores. O [`JobProgress`] recebe as observações do laço de
//! consulta e as exibe sem bloquear o orquestrador.

use std::time::Duration;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::backend::{ProcessedFile, StatusResponse};
use crate::orchestrator::ProgressObserver;
use crate::tracker::{Outcome, PollObservation, RunReport};

/// Indicador visual de progresso para o processamento de um arquivo.
///
/// Exibe uma barra de 0 a 100% durante o processamento e mensagens
/// coloridas para sucesso (verde), falha (vermelho) e timeout (amarelo).
pub struct JobProgress {
    pb: ProgressBar,
    // Modo JSON: nada além do relatório vai para stdout.
    quiet: bool,
    green: Style,
    red: Style,
    yellow: Style,
}

impl JobProgress {
    /// Inicia a barra com a descrição do job.
    pub fn start(description: &str) -> Self {
        let pb = ProgressBar::new(100);
        pb.set_style(
            ProgressStyle::with_template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos:>3}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        pb.set_message(format!("Processing started: {description}"));
        pb.enable_steady_tick(Duration::from_millis(100));
        Self::with_bar(pb, false)
    }

    /// Instância sem saída visual, usada com `--json`.
    pub fn hidden() -> Self {
        Self::with_bar(ProgressBar::hidden(), true)
    }

    fn with_bar(pb: ProgressBar, quiet: bool) -> Self {
        Self {
            pb,
            quiet,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Finaliza a barra e exibe o resultado final do job.
    pub fn complete(&self, outcome: &Outcome) {
        if matches!(outcome, Outcome::Completed(_)) {
            self.pb.set_position(100);
        }
        self.pb.finish_and_clear();
        if let Some(line) = self.outcome_line(outcome) {
            println!("{line}");
        }
    }

    // Linha final do job; `None` no modo JSON.
    fn outcome_line(&self, outcome: &Outcome) -> Option<String> {
        if self.quiet {
            return None;
        }

        let line = match outcome {
            Outcome::Completed(summary) => format!(
                "  {} Processing complete: {} messages, {} orders found",
                self.green.apply_to("✓"),
                summary.total_messages,
                summary.total_orders
            ),
            Outcome::Failed(reason) => {
                format!("  {} Processing failed: {reason}", self.red.apply_to("✗"))
            }
            Outcome::TimedOut(attempts) => format!(
                "  {} Processing is taking longer than expected ({attempts} checks). Please check back later.",
                self.yellow.apply_to("⏰")
            ),
            Outcome::Cancelled(attempts) => format!(
                "  {} Stopped watching after {attempts} checks; the backend keeps processing.",
                self.yellow.apply_to("■")
            ),
        };
        Some(line)
    }

    /// Mostra onde baixar a planilha gerada.
    pub fn processed_file(&self, file: &ProcessedFile) {
        if self.quiet {
            return;
        }
        println!(
            "  {} Processed file: {} (download with `orderflow download {}`)",
            self.green.apply_to("↓"),
            file.file_name,
            file.chatfile
        );
    }

    /// Imprime o relatório final formatado em JSON.
    pub fn print_report(&self, report: &RunReport) {
        println!("{}", serde_json::to_string_pretty(report).unwrap_or_default());
    }
}

impl ProgressObserver for JobProgress {
    fn observe(&mut self, observation: &PollObservation) {
        self.pb
            .set_position((observation.progress * 100.0).round() as u64);

        if observation.is_inconclusive() {
            let error = observation.error.as_deref().unwrap_or("unknown");
            self.pb.println(format!(
                "  {} Check {}/{}: status unknown ({error})",
                self.yellow.apply_to("↻"),
                observation.attempt,
                observation.max_attempts
            ));
        }

        // A cada quatro consultas, lembra que a classificação é lenta.
        let message = if observation.attempt % 4 == 0 {
            "AI is classifying messages... this takes time due to rate limits".to_string()
        } else {
            format!(
                "Processing... (step {}/{})",
                observation.attempt, observation.max_attempts
            )
        };
        self.pb.set_message(message);
    }
}

/// Linha única com o status de um job, para o subcomando `status`.
pub fn status_line(id: &str, status: &StatusResponse) -> String {
    if status.is_processed {
        format!(
            "#{id}: processed ({} messages, {} orders)",
            status.total_messages.unwrap_or(0),
            status.total_orders.unwrap_or(0)
        )
    } else if let Some(error) = status.error_message() {
        format!("#{id}: failed ({error})")
    } else {
        format!("#{id}: processing")
    }
}
