pub mod gateway;
pub mod installments;
pub mod mercado_pago;
pub mod signature;

pub use gateway::{GatewayError, GatewayPayment, InstallmentOption, PaymentGateway};
pub use mercado_pago::MercadoPagoClient;
