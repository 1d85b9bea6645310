use std::sync::Arc;

use crate::{
    config::Settings,
    error::{AppError, Result},
    payments::PaymentGateway,
    service::{payment_service::PaymentService, webhook_service::WebhookService, ServiceContext},
};

#[derive(Clone)]
pub struct AppState {
    pub service_context: Arc<ServiceContext>,
    pub gateway: Option<Arc<dyn PaymentGateway>>,
    pub payment_service: Option<Arc<PaymentService>>,
    pub webhook_service: Option<Arc<WebhookService>>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(
        service_context: Arc<ServiceContext>,
        gateway: Option<Arc<dyn PaymentGateway>>,
        settings: Arc<Settings>,
    ) -> Self {
        let payment_service = gateway
            .clone()
            .map(|g| Arc::new(service_context.payment_service(g)));
        let webhook_service = gateway
            .clone()
            .map(|g| Arc::new(service_context.webhook_service(g)));

        Self {
            service_context,
            gateway,
            payment_service,
            webhook_service,
            settings,
        }
    }

    pub fn gateway(&self) -> Result<&Arc<dyn PaymentGateway>> {
        self.gateway.as_ref().ok_or_else(not_configured)
    }

    pub fn payments(&self) -> Result<&PaymentService> {
        self.payment_service.as_deref().ok_or_else(not_configured)
    }

    pub fn webhooks(&self) -> Result<&WebhookService> {
        self.webhook_service.as_deref().ok_or_else(not_configured)
    }
}

fn not_configured() -> AppError {
    AppError::Configuration("payment gateway credentials are not configured".to_string())
}
