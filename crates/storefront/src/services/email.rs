//! Order confirmation email.
//!
//! Uses SMTP via lettre for delivery with Askama text and HTML templates.

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;
use tracing::{debug, info, warn};

use piffy_core::{CurrencyCode, OrderWithItems, Price};

use crate::config::EmailConfig;

use super::webhook::OrderNotifier;

/// Subject line for order confirmations.
pub const ORDER_CONFIRMATION_SUBJECT: &str = "Your Piffy Studio Order Confirmation";

/// One rendered order line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationLine {
    pub title: String,
    pub quantity: i32,
    pub amount: String,
}

#[derive(Template)]
#[template(path = "email/order_confirmation.html")]
struct OrderConfirmationHtml<'a> {
    order_id: i32,
    shipping_name: Option<&'a str>,
    lines: &'a [ConfirmationLine],
    total: &'a str,
}

#[derive(Template)]
#[template(path = "email/order_confirmation.txt")]
struct OrderConfirmationText<'a> {
    order_id: i32,
    shipping_name: Option<&'a str>,
    lines: &'a [ConfirmationLine],
    total: &'a str,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// Rendered confirmation bodies.
#[derive(Debug, Clone)]
pub struct ConfirmationBody {
    pub text: String,
    pub html: String,
}

/// Render the confirmation email for an order.
///
/// # Errors
///
/// Returns `EmailError::Template` if a template fails to render.
pub fn render_order_confirmation(
    order: &OrderWithItems,
    currency: CurrencyCode,
) -> Result<ConfirmationBody, EmailError> {
    let lines: Vec<ConfirmationLine> = order
        .items
        .iter()
        .map(|item| ConfirmationLine {
            title: item.title.clone(),
            quantity: item.quantity,
            amount: item
                .line_total()
                .map(|minor| Price::from_minor_units(minor, currency).to_string())
                .unwrap_or_default(),
        })
        .collect();
    let total = Price::new(order.order.total_price, currency).to_string();
    let shipping_name = order.order.shipping.name.as_deref();
    let order_id = order.order.id.as_i32();

    let html = OrderConfirmationHtml {
        order_id,
        shipping_name,
        lines: &lines,
        total: &total,
    }
    .render()?;
    let text = OrderConfirmationText {
        order_id,
        shipping_name,
        lines: &lines,
        total: &total,
    }
    .render()?;

    Ok(ConfirmationBody { text, html })
}

/// Email service for order confirmations.
#[derive(Clone)]
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
    currency: CurrencyCode,
}

impl std::fmt::Debug for EmailService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailService")
            .field("from_address", &self.from_address)
            .field("currency", &self.currency)
            .finish_non_exhaustive()
    }
}

impl EmailService {
    /// Create a new email service from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: &EmailConfig, currency: CurrencyCode) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
            currency,
        })
    }

    /// Send the order confirmation to the order's email address.
    ///
    /// # Errors
    ///
    /// Returns error if the order has no email, a template fails to render, or
    /// delivery fails.
    pub async fn send_order_confirmation(&self, order: &OrderWithItems) -> Result<(), EmailError> {
        let to = order
            .order
            .email
            .as_deref()
            .ok_or_else(|| EmailError::InvalidAddress(String::new()))?;
        let body = render_order_confirmation(order, self.currency)?;

        self.send_multipart_email(to, ORDER_CONFIRMATION_SUBJECT, &body.text, &body.html)
            .await
    }

    /// Send a multipart email with both plain text and HTML versions.
    async fn send_multipart_email(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        self.mailer.send(email).await?;

        info!(to = %to, subject = %subject, "Email sent successfully");
        Ok(())
    }
}

/// Sends order confirmations in the background.
///
/// Holds no service when SMTP is not configured; confirmations are then
/// skipped.
#[derive(Debug, Clone, Default)]
pub struct ConfirmationMailer {
    service: Option<EmailService>,
}

impl ConfirmationMailer {
    #[must_use]
    pub const fn new(service: Option<EmailService>) -> Self {
        Self { service }
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.service.is_some()
    }
}

impl OrderNotifier for ConfirmationMailer {
    fn order_confirmed(&self, order: &OrderWithItems) {
        let Some(service) = self.service.clone() else {
            debug!(order_id = %order.order.id, "Email disabled, skipping confirmation");
            return;
        };
        if order.order.email.is_none() {
            warn!(order_id = %order.order.id, "Order has no email, skipping confirmation");
            return;
        }

        let order = order.clone();
        tokio::spawn(async move {
            if let Err(e) = service.send_order_confirmation(&order).await {
                warn!(
                    order_id = %order.order.id,
                    error = %e,
                    "Failed to send order confirmation"
                );
            }
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use piffy_core::{
        MinorUnits, Order, OrderId, OrderItem, OrderItemId, OrderStatus, ProductId,
        ShippingAddress,
    };

    use super::*;

    fn order() -> OrderWithItems {
        OrderWithItems {
            order: Order {
                id: OrderId::new(42),
                user_id: None,
                email: Some("jo@example.com".to_string()),
                total_price: "32.00".parse().unwrap(),
                stripe_session_id: "cs_test_1".to_string(),
                stripe_payment_intent: Some("pi_1".to_string()),
                shipping: ShippingAddress {
                    name: Some("Jo <Bloggs>".to_string()),
                    ..ShippingAddress::default()
                },
                status: OrderStatus::Paid,
                created_at: Utc::now(),
            },
            items: vec![OrderItem {
                id: OrderItemId::new(1),
                order_id: OrderId::new(42),
                product_id: Some(ProductId::new(1)),
                variant_id: None,
                title: "Fox Print".to_string(),
                quantity: 2,
                unit_amount: MinorUnits::new(1250),
            }],
        }
    }

    #[test]
    fn test_render_text_body() {
        let body = render_order_confirmation(&order(), CurrencyCode::GBP).unwrap();
        assert!(body.text.contains("Order #42"));
        assert!(body.text.contains("Fox Print x 2: £25.00"));
        assert!(body.text.contains("Total: £32.00"));
    }

    #[test]
    fn test_render_html_escapes_names() {
        let body = render_order_confirmation(&order(), CurrencyCode::GBP).unwrap();
        assert!(body.html.contains("Jo &#60;Bloggs&#62;") || body.html.contains("Jo &lt;Bloggs&gt;"));
        assert!(!body.html.contains("<Bloggs>"));
    }

    #[test]
    fn test_disabled_email_is_a_no_op() {
        let notifier = ConfirmationMailer::default();
        assert!(!notifier.is_enabled());
        notifier.order_confirmed(&order());
    }
}
