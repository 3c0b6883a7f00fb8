//! # Ticket Rendering
//!
//! Plain-text ticket bodies built from the order and its sale
//! snapshots. Snapshots carry the frozen product names and line
//! totals, so a ticket rendered weeks later still matches what was
//! charged.

use comanda_core::{Money, Order, PaymentMethod, Sale};
use comanda_db::{Database, TicketEmail};

use crate::config::NotifyConfig;
use crate::error::{NotifyError, NotifyResult};

/// Subject line for an order's ticket e-mail.
pub fn ticket_subject(order: &Order, config: &NotifyConfig) -> String {
    format!(
        "Ticket de Compra #{} - {}",
        order.ticket_number, config.restaurant_name
    )
}

/// Renders the plain-text ticket body.
pub fn render_ticket(order: &Order, sales: &[Sale], config: &NotifyConfig) -> String {
    let mut body = String::new();

    body.push_str(&config.restaurant_name);
    body.push('\n');
    body.push_str(&format!("Ticket #{}\n", order.ticket_number));
    body.push_str(&format!("Cliente: {}\n", order.customer_name));
    if let Some(paid_at) = order.paid_at {
        body.push_str(&format!("Fecha: {}\n", paid_at.format("%d/%m/%Y %H:%M")));
    }
    body.push('\n');

    for sale in sales {
        body.push_str(&format!(
            "{:>3} x {:<30} {:>9}\n",
            sale.quantity,
            sale.product_name,
            sale.total().to_string()
        ));
    }

    body.push('\n');
    body.push_str(&format!(
        "TOTAL: {}\n",
        Money::from_cents(order.total_cents)
    ));
    body.push_str(&format!("Pago: {}\n", payment_label(order.payment_method)));
    body.push('\n');
    body.push_str("Gracias por su preferencia.\n");

    body
}

fn payment_label(method: PaymentMethod) -> &'static str {
    match method {
        PaymentMethod::Cash => "Efectivo",
        PaymentMethod::Transfer => "Transferencia",
        PaymentMethod::Pending => "Pendiente",
    }
}

/// Renders and queues the ticket e-mail for a paid order.
///
/// Fails with [`NotifyError::NoRecipient`] when the order carries no
/// customer e-mail; the caller surfaces that as a banner, the order
/// itself is unaffected.
pub async fn queue_ticket_for_order(
    db: &Database,
    order_id: &str,
    config: &NotifyConfig,
) -> NotifyResult<TicketEmail> {
    let order = db
        .orders()
        .get_by_id(order_id)
        .await?
        .ok_or_else(|| comanda_db::DbError::not_found("Order", order_id))?;

    let recipient = order
        .customer_email
        .clone()
        .ok_or_else(|| NotifyError::NoRecipient(order_id.to_string()))?;

    let sales = db.orders().sales_for_order(order_id).await?;

    let subject = ticket_subject(&order, config);
    let body = render_ticket(&order, &sales, config);

    let entry = db
        .outbox()
        .queue(order_id, &recipient, &subject, &body)
        .await?;

    Ok(entry)
}

// =============================================================================
// Unit Tests
// =============================================================================
