//! Operator notifications.
//!
//! Transient message texts and lifetimes, plus the audible alert seam. Alerts
//! are best-effort: the coordinator runs them off the async workers and only
//! logs their failures.

use std::io::Write as _;
use std::time::Duration;

/// How long each kind of transient feedback stays visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoticeTimings {
    pub refresh_failure: Duration,
    pub invoice_result: Duration,
    pub new_order_flag: Duration,
}

impl Default for NoticeTimings {
    fn default() -> Self {
        Self {
            refresh_failure: Duration::from_secs(5),
            invoice_result: Duration::from_secs(3),
            new_order_flag: Duration::from_secs(5),
        }
    }
}

pub const REFRESH_FAILED_MESSAGE: &str =
    "⚠️ Não foi possível carregar os pedidos. Verifique o backend.";
pub const INVOICE_FAILED_MESSAGE: &str = "❌ Erro ao enviar para faturamento";

pub fn invoice_sent_message(customer_name: &str) -> String {
    format!("✅ Pedido de {customer_name} enviado para faturamento!")
}

/// Something that can make the "new order" sound.
pub trait Alerter: Send + Sync {
    fn play(&self) -> Result<(), String>;
}

/// Rings the terminal bell on stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalBell;

impl Alerter for TerminalBell {
    fn play(&self) -> Result<(), String> {
        let mut out = std::io::stdout().lock();
        out.write_all(b"\x07")
            .and_then(|_| out.flush())
            .map_err(|e| format!("terminal bell failed: {e}"))
    }
}

/// Used when sound is switched off.
#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl Alerter for Silent {
    fn play(&self) -> Result<(), String> {
        Ok(())
    }
}
