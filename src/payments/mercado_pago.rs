use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    config::{DeploymentEnvironment, GatewayCredentials},
    domain::{from_cents, to_cents, MethodDetails, Payer, PaymentRequest, PaymentStatus},
    payments::gateway::{GatewayError, GatewayPayment, InstallmentOption, PaymentGateway},
};

const PIX_METHOD_ID: &str = "pix";

fn is_payment_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= 32 && id.bytes().all(|b| b.is_ascii_digit())
}

/// Mercado Pago REST client. Authenticates with a bearer access token.
pub struct MercadoPagoClient {
    http: reqwest::Client,
    api_base: String,
    credentials: GatewayCredentials,
}

impl MercadoPagoClient {
    pub fn new(
        credentials: GatewayCredentials,
        api_base: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        let api_base = api_base.into().trim_end_matches('/').to_string();

        Ok(Self {
            http,
            api_base,
            credentials,
        })
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, GatewayError> {
        let resp = request
            .bearer_auth(&self.credentials.access_token)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(GatewayError::Api {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str::<T>(&body)
            .map_err(|e| GatewayError::InvalidResponse(format!("{e}; body={body}")))
    }
}

#[async_trait]
impl PaymentGateway for MercadoPagoClient {
    fn environment(&self) -> DeploymentEnvironment {
        self.credentials.environment
    }

    fn public_key(&self) -> &str {
        &self.credentials.public_key
    }

    async fn create_payment(
        &self,
        request: &PaymentRequest,
        idempotency_key: &str,
    ) -> Result<GatewayPayment, GatewayError> {
        let body = CreatePaymentBody::from_request(request);

        tracing::debug!(
            order_id = %request.order_id,
            method = request.method().as_str(),
            "Creating gateway payment"
        );

        let resp: PaymentResponse = self
            .send(
                self.http
                    .post(format!("{}/v1/payments", self.api_base))
                    .header("X-Idempotency-Key", idempotency_key)
                    .json(&body),
            )
            .await?;

        Ok(resp.into_gateway_payment())
    }

    async fn get_payment(&self, external_id: &str) -> Result<GatewayPayment, GatewayError> {
        // Payment ids are numeric; anything else must not reach the URL path.
        if !is_payment_id(external_id) {
            return Err(GatewayError::InvalidPaymentId(external_id.to_string()));
        }

        let resp: PaymentResponse = self
            .send(
                self.http
                    .get(format!("{}/v1/payments/{}", self.api_base, external_id)),
            )
            .await?;

        Ok(resp.into_gateway_payment())
    }

    async fn installment_options(
        &self,
        amount_cents: i64,
        payment_method_id: &str,
        issuer_id: Option<&str>,
    ) -> Result<Vec<InstallmentOption>, GatewayError> {
        let mut params = vec![
            ("amount", format!("{:.2}", from_cents(amount_cents))),
            ("payment_method_id", payment_method_id.to_string()),
        ];
        if let Some(issuer_id) = issuer_id {
            params.push(("issuer.id", issuer_id.to_string()));
        }

        let entries: Vec<InstallmentsEntry> = self
            .send(
                self.http
                    .get(format!("{}/v1/payment_methods/installments", self.api_base))
                    .query(&params),
            )
            .await?;

        Ok(entries
            .into_iter()
            .next()
            .map(|entry| entry.payer_costs.into_iter().map(PayerCost::into_option).collect())
            .unwrap_or_default())
    }
}

#[derive(Debug, Serialize)]
struct CreatePaymentBody<'a> {
    transaction_amount: f64,
    description: &'a str,
    payment_method_id: &'a str,
    external_reference: &'a str,
    payer: &'a Payer,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    installments: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    issuer_id: Option<&'a str>,
    metadata: Value,
}

impl<'a> CreatePaymentBody<'a> {
    fn from_request(request: &'a PaymentRequest) -> Self {
        let (payment_method_id, token, installments, issuer_id) = match &request.method_details {
            MethodDetails::InstantTransfer => (PIX_METHOD_ID, None, None, None),
            MethodDetails::Card {
                token,
                payment_method_id,
                installments,
                issuer_id,
            } => (
                payment_method_id.as_str(),
                Some(token.as_str()),
                Some(*installments),
                issuer_id.as_deref(),
            ),
        };

        Self {
            transaction_amount: from_cents(request.amount_cents),
            description: &request.description,
            payment_method_id,
            external_reference: &request.order_id,
            payer: &request.payer,
            token,
            installments,
            issuer_id,
            metadata: serde_json::json!({
                "order_id": request.order_id,
                "user_id": request.user_id,
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PaymentResponse {
    id: Value,
    status: String,
    status_detail: Option<String>,
    external_reference: Option<String>,
    payment_method_id: Option<String>,
    issuer_id: Option<Value>,
    installments: Option<u32>,
    date_of_expiration: Option<String>,
    point_of_interaction: Option<PointOfInteraction>,
}

#[derive(Debug, Deserialize)]
struct PointOfInteraction {
    transaction_data: Option<TransactionData>,
}

#[derive(Debug, Deserialize)]
struct TransactionData {
    qr_code: Option<String>,
    qr_code_base64: Option<String>,
    ticket_url: Option<String>,
}

impl PaymentResponse {
    fn into_gateway_payment(self) -> GatewayPayment {
        let mut metadata = Map::new();

        if let Some(data) = self.point_of_interaction.and_then(|p| p.transaction_data) {
            insert_opt(&mut metadata, "qr_code", data.qr_code.map(Value::String));
            insert_opt(&mut metadata, "qr_code_base64", data.qr_code_base64.map(Value::String));
            insert_opt(&mut metadata, "ticket_url", data.ticket_url.map(Value::String));
        }
        insert_opt(&mut metadata, "payment_method_id", self.payment_method_id.map(Value::String));
        insert_opt(&mut metadata, "issuer_id", self.issuer_id.filter(|v| !v.is_null()));
        insert_opt(&mut metadata, "installments", self.installments.map(Value::from));
        insert_opt(&mut metadata, "date_of_expiration", self.date_of_expiration.map(Value::String));

        GatewayPayment {
            id: id_to_string(&self.id),
            status: PaymentStatus::from_gateway(&self.status),
            status_detail: self.status_detail,
            external_reference: self.external_reference.filter(|r| !r.is_empty()),
            metadata: Value::Object(metadata),
        }
    }
}

fn insert_opt(map: &mut Map<String, Value>, key: &str, value: Option<Value>) {
    if let Some(value) = value {
        map.insert(key.to_string(), value);
    }
}

// Payment ids arrive as JSON numbers; keep them as strings internally.
fn id_to_string(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct InstallmentsEntry {
    #[serde(default)]
    payer_costs: Vec<PayerCost>,
}

#[derive(Debug, Deserialize)]
struct PayerCost {
    installments: u32,
    #[serde(default)]
    installment_rate: f64,
    installment_amount: f64,
    total_amount: f64,
    #[serde(default)]
    labels: Vec<String>,
}

impl PayerCost {
    fn into_option(self) -> InstallmentOption {
        InstallmentOption {
            installments: self.installments,
            installment_rate: self.installment_rate,
            installment_amount_cents: to_cents(self.installment_amount),
            total_amount_cents: to_cents(self.total_amount),
            labels: self.labels,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Identification;

    fn payer() -> Payer {
        Payer {
            email: "buyer@example.com".to_string(),
            first_name: Some("Ana".to_string()),
            last_name: None,
            identification: Some(Identification {
                id_type: "CPF".to_string(),
                number: "12345678909".to_string(),
            }),
        }
    }

    fn request(method_details: MethodDetails) -> PaymentRequest {
        PaymentRequest {
            order_id: "order-1".to_string(),
            user_id: "user-1".to_string(),
            amount_cents: 15990,
            description: "Pedido order-1".to_string(),
            payer: payer(),
            method_details,
        }
    }

    #[test]
    fn pix_body_uses_fixed_method_id() {
        let req = request(MethodDetails::InstantTransfer);
        let body = serde_json::to_value(CreatePaymentBody::from_request(&req)).unwrap();

        assert_eq!(body["payment_method_id"], "pix");
        assert_eq!(body["transaction_amount"], 159.9);
        assert_eq!(body["external_reference"], "order-1");
        assert_eq!(body["payer"]["identification"]["type"], "CPF");
        assert!(body.get("token").is_none());
        assert!(body.get("installments").is_none());
    }

    #[test]
    fn card_body_carries_token_and_installments() {
        let req = request(MethodDetails::Card {
            token: "card-token".to_string(),
            payment_method_id: "visa".to_string(),
            installments: 3,
            issuer_id: Some("25".to_string()),
        });
        let body = serde_json::to_value(CreatePaymentBody::from_request(&req)).unwrap();

        assert_eq!(body["payment_method_id"], "visa");
        assert_eq!(body["token"], "card-token");
        assert_eq!(body["installments"], 3);
        assert_eq!(body["issuer_id"], "25");
    }

    #[test]
    fn parses_pix_response_metadata() {
        let raw = serde_json::json!({
            "id": 1234567890u64,
            "status": "pending",
            "status_detail": "pending_waiting_transfer",
            "external_reference": "order-1",
            "payment_method_id": "pix",
            "issuer_id": null,
            "point_of_interaction": {
                "transaction_data": {
                    "qr_code": "00020126...",
                    "qr_code_base64": "iVBORw0KGgo=",
                    "ticket_url": "https://example.com/ticket"
                }
            }
        });

        let resp: PaymentResponse = serde_json::from_value(raw).unwrap();
        let payment = resp.into_gateway_payment();

        assert_eq!(payment.id, "1234567890");
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.external_reference.as_deref(), Some("order-1"));
        assert_eq!(payment.metadata["qr_code"], "00020126...");
        assert!(payment.metadata.get("issuer_id").is_none());
    }

    #[test]
    fn payer_costs_convert_to_cents() {
        let raw = serde_json::json!([{
            "payment_method_id": "visa",
            "payer_costs": [
                {"installments": 1, "installment_rate": 0, "installment_amount": 100.0, "total_amount": 100.0, "labels": []},
                {"installments": 3, "installment_rate": 0, "installment_amount": 33.33, "total_amount": 100.0, "labels": ["CFT_0,00%"]}
            ]
        }]);

        let entries: Vec<InstallmentsEntry> = serde_json::from_value(raw).unwrap();
        let options: Vec<InstallmentOption> = entries
            .into_iter()
            .next()
            .unwrap()
            .payer_costs
            .into_iter()
            .map(PayerCost::into_option)
            .collect();

        assert_eq!(options.len(), 2);
        assert_eq!(options[1].installment_amount_cents, 3333);
        assert_eq!(options[1].total_amount_cents, 10000);
        assert_eq!(options[1].labels, vec!["CFT_0,00%".to_string()]);
    }

    #[test]
    fn payment_ids_must_be_numeric() {
        assert!(is_payment_id("1234567890"));
        assert!(!is_payment_id(""));
        assert!(!is_payment_id("../users/me"));
        assert!(!is_payment_id("123/../../v1/users/me"));
        assert!(!is_payment_id("123?access_token=x"));
    }

    #[tokio::test]
    async fn get_payment_rejects_path_traversal_without_request() {
        let credentials = GatewayCredentials {
            environment: DeploymentEnvironment::Test,
            access_token: "TEST-token".to_string(),
            public_key: "TEST-key".to_string(),
        };
        // Nothing listens on port 9; a request would fail with a transport error.
        let client =
            MercadoPagoClient::new(credentials, "http://127.0.0.1:9", Duration::from_secs(1)).unwrap();

        let err = client.get_payment("../users/me").await.unwrap_err();
        assert!(matches!(err, GatewayError::InvalidPaymentId(ref id) if id == "../users/me"));
    }
}
