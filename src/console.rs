//! Plain-text console front end for the refresh coordinator.
//!
//! Prints the board whenever the published snapshot changes and reads
//! operator commands from stdin.

use std::fmt::Write as _;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::analytics::{format_currency, format_date_time, SalesSummary};
use crate::order::Order;
use crate::refresh::{PanelSnapshot, RefreshCoordinator};

pub const HELP: &str = "Comandos: open <id> | close | invoice <id> | refresh | summary | help | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Open(String),
    Close,
    Invoice(String),
    Refresh,
    Summary,
    Help,
    Quit,
}

pub fn parse_command(line: &str) -> Result<Command, String> {
    let mut parts = line.split_whitespace();
    let verb = parts.next().unwrap_or_default().to_ascii_lowercase();
    let arg = parts.next().map(str::to_string);
    if parts.next().is_some() {
        return Err(format!("Too many arguments: {line}"));
    }

    match (verb.as_str(), arg) {
        ("open", Some(id)) => Ok(Command::Open(id)),
        ("invoice", Some(id)) => Ok(Command::Invoice(id)),
        ("open" | "invoice", None) => Err(format!("Usage: {verb} <id>")),
        ("close", None) => Ok(Command::Close),
        ("refresh", None) => Ok(Command::Refresh),
        ("summary", None) => Ok(Command::Summary),
        ("help", None) => Ok(Command::Help),
        ("quit" | "exit", None) => Ok(Command::Quit),
        ("", _) => Err("Empty command".into()),
        _ => Err(format!("Unknown command: {line}")),
    }
}

fn order_line(out: &mut String, order: &Order, with_status: bool) {
    let _ = write!(
        out,
        "  [{}] {} | {} | R$ {}",
        order.id,
        order.customer.name,
        format_date_time(&order.created_at),
        format_currency(order.total)
    );
    if with_status {
        let _ = write!(out, " | {}", order.status);
    }
    out.push('\n');
}

fn detail(out: &mut String, order: &Order) {
    let _ = writeln!(out, "-- Pedido de {} --", order.customer.name);
    let _ = writeln!(out, "  Telefone: {}", order.customer.phone);
    let _ = writeln!(out, "  Endereço: {}", order.customer.address);
    let _ = writeln!(out, "  Pagamento: {}", order.customer.payment_method);
    if let Some(method) = &order.delivery_method {
        let _ = writeln!(out, "  Forma: {method}");
    }
    let _ = writeln!(out, "  Itens: {}", order.item_count());
    for item in &order.items {
        let _ = writeln!(
            out,
            "  {} ({}x R$ {}) = R$ {}",
            item.name,
            item.quantity,
            format_currency(item.unit_price),
            format_currency(item.line_total())
        );
    }
    let _ = writeln!(out, "  Total: R$ {}", format_currency(order.total));
    let items_total = order.items_total();
    if (items_total - order.total).abs() >= 0.005 {
        let _ = writeln!(out, "  Soma dos itens: R$ {}", format_currency(items_total));
    }
    if !order.note.is_empty() {
        let _ = writeln!(out, "  Observações: {}", order.note);
    }
}

/// Text rendering of one snapshot.
pub fn render(snapshot: &PanelSnapshot) -> String {
    let mut out = String::new();
    if snapshot.is_loading {
        out.push_str("Carregando painel de pedidos...\n");
        return out;
    }
    if let Some(message) = &snapshot.transient_message {
        let _ = writeln!(out, "{message}");
    }
    if snapshot.has_new_order {
        out.push_str("🔔 Novo pedido recebido!\n");
    }

    let _ = writeln!(out, "Pedidos em Andamento ({})", snapshot.in_progress.len());
    for order in &snapshot.in_progress {
        order_line(&mut out, order, false);
    }
    let _ = writeln!(out, "Pedidos Concluídos ({})", snapshot.concluded.len());
    if snapshot.concluded.is_empty() {
        out.push_str("  Nenhum pedido concluído\n");
    }
    for order in &snapshot.concluded {
        order_line(&mut out, order, true);
    }
    if let Some(order) = &snapshot.selected_order {
        detail(&mut out, order);
    }
    out
}

pub fn render_summary(summary: &SalesSummary) -> String {
    format!(
        "Total de Pedidos (dia): {} | Vendas Concluídas: R$ {} | Em Andamento: {}",
        summary.orders_today,
        format_currency(summary.concluded_sales),
        summary.in_progress_count
    )
}

/// Run until `quit` or the coordinator shuts down. When stdin closes (for
/// example a headless launch) the board keeps printing updates.
pub async fn run_console(coordinator: RefreshCoordinator) {
    let updates = coordinator.subscribe();
    let lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{HELP}");
    serve(&coordinator, updates, lines).await;
    info!("Console closed");
}

async fn serve<R>(
    coordinator: &RefreshCoordinator,
    mut updates: watch::Receiver<PanelSnapshot>,
    mut lines: Lines<R>,
) where
    R: AsyncBufRead + Unpin,
{
    let mut input_open = true;
    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                println!("{}", render(&snapshot));
            }
            line = lines.next_line(), if input_open => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        info!("Operator input closed; polling continues until shutdown");
                        input_open = false;
                        continue;
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to read operator input");
                        input_open = false;
                        continue;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match parse_command(&line) {
                    Ok(Command::Quit) => break,
                    Ok(command) => execute(coordinator, command).await,
                    Err(e) => println!("{e}\n{HELP}"),
                }
            }
            _ = coordinator.cancelled() => break,
        }
    }
}

async fn execute(coordinator: &RefreshCoordinator, command: Command) {
    match command {
        Command::Open(id) => {
            if !coordinator.open_order(&id) {
                println!("Pedido {id} não encontrado");
            }
        }
        Command::Close => coordinator.close_order(),
        Command::Invoice(id) => {
            coordinator.invoice(&id).await;
        }
        Command::Refresh => {
            coordinator.refresh().await;
        }
        Command::Summary => {
            let summary = SalesSummary::from_snapshot(&coordinator.snapshot());
            println!("{}", render_summary(&summary));
        }
        Command::Help => println!("{HELP}"),
        Command::Quit => {}
    }
}
