use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use crate::services::{
    CollaboratorError, EmailSender, PaymentGateway, PaymentIntent, PaymentIntentRequest, SmsSender,
};

/// Outbound adapters that record the delivery in the log instead of calling a
/// provider API. Used by the standalone binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogOnlyOutbound;

#[async_trait]
impl EmailSender for LogOnlyOutbound {
    async fn send_booking_confirmation(
        &self,
        customer_id: Uuid,
        booking_id: Uuid,
    ) -> Result<(), CollaboratorError> {
        info!(%customer_id, %booking_id, "booking confirmation email queued");
        Ok(())
    }

    async fn send_provider_opportunity(
        &self,
        provider_id: Uuid,
        booking_id: Uuid,
    ) -> Result<(), CollaboratorError> {
        info!(%provider_id, %booking_id, "provider opportunity email queued");
        Ok(())
    }
}

#[async_trait]
impl SmsSender for LogOnlyOutbound {
    async fn send_sms(&self, phone: &str, message: &str) -> Result<(), CollaboratorError> {
        if phone.trim().is_empty() {
            return Err(CollaboratorError::Unavailable(
                "sms recipient has no phone number".to_string(),
            ));
        }

        info!(phone, message, "sms queued");
        Ok(())
    }
}

#[async_trait]
impl PaymentGateway for LogOnlyOutbound {
    async fn create_payment_intent(
        &self,
        request: PaymentIntentRequest,
    ) -> Result<PaymentIntent, CollaboratorError> {
        let intent = PaymentIntent {
            id: format!("pi_{}", Uuid::new_v4().simple()),
        };

        info!(
            booking_id = %request.booking_id,
            amount_cents = request.amount_cents,
            application_fee_cents = request.application_fee_cents,
            payment_intent_id = %intent.id,
            "payment intent created"
        );

        Ok(intent)
    }
}
