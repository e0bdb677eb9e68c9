//! Two-step checkout: shipping details, then payment.
//!
//! ```text
//! CollectingShipping -> SelectingPayment -> Submitting -> Completed
//!         ^                    |                 |
//!         +--------------------+                 +-> AwaitingGateway -> Completed | Failed
//! ```
//!
//! Cash on delivery creates the order directly. The online path only opens
//! a hosted payment session; the order exists once the gateway redirect has
//! been verified by the server. A failed submission returns to
//! `SelectingPayment` with the cart untouched.

use reqwest::Url;
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::dto::{CreateOrderRequest, PaymentInitRequest, PaymentVerifyRequest};
use crate::client::api_client::{ApiClientError, StorefrontApi};
use crate::client::cart::CartStore;
use crate::domain::aggregates::{OrderLine, OrderTotals, PaymentMethod, ShippingInfo};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CheckoutError {
    #[error("Please fill in: {}", .0.join(", "))]
    MissingShippingFields(Vec<&'static str>),

    #[error("Please choose a payment method")]
    NoPaymentMethod,

    #[error("Your cart is empty")]
    EmptyCart,

    #[error("checkout is not at the {0} step")]
    WrongStep(&'static str),

    #[error(transparent)]
    Api(#[from] ApiClientError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutStep {
    CollectingShipping,
    SelectingPayment,
    Submitting,
    AwaitingGateway { order_ref: String, redirect_url: String },
    Completed { order_id: i64 },
    Failed { reason: String },
}

/// Totals for one payment-method choice. Every surface renders `display_total`
/// so the summary and the submit button can never disagree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutQuote { pub totals: OrderTotals, pub display_total: String, method: Option<PaymentMethod> }

impl CheckoutQuote {
    pub fn summary_line(&self) -> String { format!("Total: {}", self.display_total) }

    pub fn button_label(&self) -> String {
        match self.method {
            Some(PaymentMethod::Flouci) => format!("Pay {}", self.display_total),
            _ => format!("Place order ({})", self.display_total),
        }
    }
}

/// Query parameters the gateway appends to the success link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayReturn { pub payment_id: String, pub order_ref: String }

impl GatewayReturn {
    pub fn from_url(url: &str) -> Option<Self> {
        let url = Url::parse(url).ok()?;
        let (mut payment_id, mut order_ref) = (None, None);
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "payment_id" | "id" => payment_id = Some(value.into_owned()),
                "order_id" => order_ref = Some(value.into_owned()),
                _ => {}
            }
        }
        Some(Self { payment_id: payment_id.filter(|v| !v.is_empty())?, order_ref: order_ref.filter(|v| !v.is_empty())? })
    }
}

#[derive(Debug, Clone)]
pub struct Checkout {
    step: CheckoutStep,
    shipping: Option<ShippingInfo>,
    payment_method: Option<PaymentMethod>,
    last_error: Option<String>,
}

impl Default for Checkout {
    fn default() -> Self { Self::new() }
}

impl Checkout {
    pub fn new() -> Self { Self { step: CheckoutStep::CollectingShipping, shipping: None, payment_method: None, last_error: None } }

    pub fn step(&self) -> &CheckoutStep { &self.step }
    pub fn shipping(&self) -> Option<&ShippingInfo> { self.shipping.as_ref() }
    pub fn payment_method(&self) -> Option<PaymentMethod> { self.payment_method }
    pub fn last_error(&self) -> Option<&str> { self.last_error.as_deref() }

    pub fn submit_shipping(&mut self, info: ShippingInfo) -> Result<(), CheckoutError> {
        if self.step != CheckoutStep::CollectingShipping {
            return Err(CheckoutError::WrongStep("shipping"));
        }
        let missing = info.missing_fields();
        if !missing.is_empty() {
            return Err(CheckoutError::MissingShippingFields(missing));
        }
        self.shipping = Some(info);
        self.step = CheckoutStep::SelectingPayment;
        Ok(())
    }

    pub fn back_to_shipping(&mut self) -> Result<(), CheckoutError> {
        if self.step != CheckoutStep::SelectingPayment {
            return Err(CheckoutError::WrongStep("payment"));
        }
        self.step = CheckoutStep::CollectingShipping;
        Ok(())
    }

    pub fn select_payment_method(&mut self, method: PaymentMethod) -> Result<(), CheckoutError> {
        if self.step != CheckoutStep::SelectingPayment {
            return Err(CheckoutError::WrongStep("payment"));
        }
        self.payment_method = Some(method);
        Ok(())
    }

    pub fn quote(&self, cart: &CartStore) -> CheckoutQuote {
        let totals = OrderTotals::for_method(cart.state().total_price(), self.payment_method);
        CheckoutQuote { display_total: totals.total.to_string(), totals, method: self.payment_method }
    }

    /// Places the order (cash on delivery) or opens a gateway session (online).
    pub async fn submit_payment(&mut self, cart: &mut CartStore, api: &dyn StorefrontApi) -> Result<&CheckoutStep, CheckoutError> {
        if self.step != CheckoutStep::SelectingPayment {
            return Err(CheckoutError::WrongStep("payment"));
        }
        let method = self.payment_method.ok_or(CheckoutError::NoPaymentMethod)?;
        let shipping = self.shipping.clone().ok_or(CheckoutError::WrongStep("shipping"))?;
        if cart.state().is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let quote = self.quote(cart);
        let items: Vec<OrderLine> = cart.state().items().iter().map(OrderLine::from).collect();
        self.step = CheckoutStep::Submitting;
        self.last_error = None;

        let outcome = match method {
            PaymentMethod::CashOnDelivery => {
                let request = CreateOrderRequest {
                    customer_email: shipping.email.clone(),
                    total: quote.totals.total.amount(),
                    payment_method: method.as_str().to_string(),
                    items,
                    shipping_info: Some(shipping),
                };
                api.create_order(&request).await.map(|created| CheckoutStep::Completed { order_id: created.order_id })
            }
            PaymentMethod::Flouci => {
                let request = PaymentInitRequest {
                    amount: Some(quote.totals.total.minor_units()),
                    order_id: Uuid::now_v7().to_string(),
                    client_email: shipping.email.clone(),
                    client_name: shipping.full_name(),
                    client_phone: shipping.phone.clone(),
                    address_billing: shipping.address.clone(),
                    city_billing: shipping.city.clone(),
                    zip_billing: shipping.postal_code.clone(),
                    items,
                    shipping_info: Some(shipping),
                };
                api.init_payment(&request)
                    .await
                    .map(|session| CheckoutStep::AwaitingGateway { order_ref: session.order_id, redirect_url: session.redirect_url })
            }
        };

        match outcome {
            Ok(step) => {
                if let CheckoutStep::Completed { order_id } = step {
                    info!(order_id, "order placed");
                    cart.clear().await;
                }
                self.step = step;
                Ok(&self.step)
            }
            Err(e) => {
                warn!(error = %e, payment_method = method.as_str(), "checkout submission failed");
                self.last_error = Some(e.to_string());
                self.step = CheckoutStep::SelectingPayment;
                Err(e.into())
            }
        }
    }

    /// Success-page handler: completes only after the server verified the payment.
    pub async fn confirm_gateway_return(&mut self, ret: &GatewayReturn, cart: &mut CartStore, api: &dyn StorefrontApi) -> &CheckoutStep {
        let request = PaymentVerifyRequest { payment_id: ret.payment_id.clone(), order_id: ret.order_ref.clone() };
        self.step = match api.verify_payment(&request).await {
            Ok(verified) => {
                info!(order_id = verified.order_id, order_ref = %verified.order_ref, "payment confirmed");
                cart.clear().await;
                CheckoutStep::Completed { order_id: verified.order_id }
            }
            Err(e) => {
                warn!(error = %e, order_ref = %ret.order_ref, "payment verification failed");
                CheckoutStep::Failed { reason: e.to_string() }
            }
        };
        &self.step
    }

    /// Failure-page handler.
    pub fn gateway_failed(&mut self) -> &CheckoutStep {
        self.step = CheckoutStep::Failed { reason: "Payment failed, please try again".into() };
        &self.step
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::dto::{LoginRequest, OrderCreated, PaymentInitResponse, PaymentVerifyResponse, RegisterRequest, Session};
    use crate::client::storage::MemoryStorage;
    use crate::domain::aggregates::product::tests::product;
    use crate::domain::aggregates::Product;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct FakeApi {
        fail: bool,
        orders: Mutex<Vec<CreateOrderRequest>>,
        inits: Mutex<Vec<PaymentInitRequest>>,
    }

    impl FakeApi {
        fn rejection() -> ApiClientError { ApiClientError::Api { status: 502, message: "Payment failed, please try again".into() } }
    }

    #[async_trait]
    impl StorefrontApi for FakeApi {
        async fn products(&self) -> Result<Vec<Product>, ApiClientError> { Ok(vec![]) }
        async fn register(&self, _r: &RegisterRequest) -> Result<Session, ApiClientError> { Err(Self::rejection()) }
        async fn login(&self, _r: &LoginRequest) -> Result<Session, ApiClientError> { Err(Self::rejection()) }

        async fn create_order(&self, request: &CreateOrderRequest) -> Result<OrderCreated, ApiClientError> {
            if self.fail { return Err(Self::rejection()); }
            self.orders.lock().unwrap().push(request.clone());
            Ok(OrderCreated { success: true, order_id: 41 })
        }

        async fn init_payment(&self, request: &PaymentInitRequest) -> Result<PaymentInitResponse, ApiClientError> {
            if self.fail { return Err(Self::rejection()); }
            self.inits.lock().unwrap().push(request.clone());
            Ok(PaymentInitResponse {
                success: true,
                order_id: request.order_id.clone(),
                pay_token: "tok".into(),
                redirect_url: "https://pay.example/tok".into(),
                result: serde_json::Value::Null,
            })
        }

        async fn verify_payment(&self, request: &PaymentVerifyRequest) -> Result<PaymentVerifyResponse, ApiClientError> {
            if self.fail { return Err(ApiClientError::Api { status: 402, message: "Payment was not completed".into() }); }
            Ok(PaymentVerifyResponse { success: true, order_id: 77, order_ref: request.order_id.clone(), status: "SUCCESS".into() })
        }
    }

    fn shipping() -> ShippingInfo {
        ShippingInfo {
            first_name: "Amira".into(), last_name: "Ben Salah".into(), email: "amira@example.tn".into(),
            phone: "+21620000000".into(), address: "12 Rue de Marseille".into(), city: "Tunis".into(),
            postal_code: "1000".into(), governorate: "Tunis".into(),
        }
    }

    async fn cart_worth_100() -> CartStore {
        let mut cart = CartStore::new(Arc::new(MemoryStorage::new()));
        cart.hydrate().await;
        cart.add_item(&product(1, Decimal::new(25, 0), 10), 4).await;
        cart
    }

    async fn at_payment_step(method: PaymentMethod) -> Checkout {
        let mut checkout = Checkout::new();
        checkout.submit_shipping(shipping()).unwrap();
        checkout.select_payment_method(method).unwrap();
        checkout
    }

    #[test]
    fn test_shipping_step_requires_every_field() {
        let mut checkout = Checkout::new();
        let mut info = shipping();
        info.city = " ".into();
        let err = checkout.submit_shipping(info).unwrap_err();
        assert!(matches!(err, CheckoutError::MissingShippingFields(ref f) if f == &vec!["city"]));
        assert_eq!(checkout.step(), &CheckoutStep::CollectingShipping);

        checkout.submit_shipping(shipping()).unwrap();
        assert_eq!(checkout.step(), &CheckoutStep::SelectingPayment);
        checkout.back_to_shipping().unwrap();
        assert_eq!(checkout.step(), &CheckoutStep::CollectingShipping);
        assert!(checkout.select_payment_method(PaymentMethod::Flouci).is_err());
    }

    #[tokio::test]
    async fn test_quote_parity_across_methods() {
        let cart = cart_worth_100().await;
        let mut checkout = Checkout::new();
        checkout.submit_shipping(shipping()).unwrap();
        for method in [PaymentMethod::CashOnDelivery, PaymentMethod::Flouci] {
            checkout.select_payment_method(method).unwrap();
            let quote = checkout.quote(&cart);
            assert!(quote.summary_line().ends_with(&quote.display_total));
            assert!(quote.button_label().contains(&quote.display_total));
        }
        checkout.select_payment_method(PaymentMethod::CashOnDelivery).unwrap();
        assert_eq!(checkout.quote(&cart).totals.total.amount(), Decimal::new(105, 0));
        checkout.select_payment_method(PaymentMethod::Flouci).unwrap();
        assert_eq!(checkout.quote(&cart).totals.total.amount(), Decimal::new(100, 0));
    }

    #[tokio::test]
    async fn test_cash_on_delivery_completes_and_clears_cart() {
        let mut cart = cart_worth_100().await;
        let api = FakeApi::default();
        let mut checkout = at_payment_step(PaymentMethod::CashOnDelivery).await;

        let step = checkout.submit_payment(&mut cart, &api).await.unwrap();
        assert_eq!(step, &CheckoutStep::Completed { order_id: 41 });
        assert!(cart.state().is_empty());

        let orders = api.orders.lock().unwrap();
        assert_eq!(orders[0].total, Decimal::new(105, 0));
        assert_eq!(orders[0].payment_method, "cash_on_delivery");
        assert_eq!(orders[0].items.len(), 1);
    }

    #[tokio::test]
    async fn test_online_payment_waits_for_gateway() {
        let mut cart = cart_worth_100().await;
        let api = FakeApi::default();
        let mut checkout = at_payment_step(PaymentMethod::Flouci).await;

        let step = checkout.submit_payment(&mut cart, &api).await.unwrap().clone();
        let CheckoutStep::AwaitingGateway { order_ref, redirect_url } = step else { panic!("expected gateway redirect") };
        assert_eq!(redirect_url, "https://pay.example/tok");
        assert_eq!(api.inits.lock().unwrap()[0].amount, Some(100_000));
        assert!(!cart.state().is_empty());

        let ret = GatewayReturn::from_url(&format!("http://shop.test/checkout/success?order_id={order_ref}&payment_id=pay-1")).unwrap();
        assert_eq!(checkout.confirm_gateway_return(&ret, &mut cart, &api).await, &CheckoutStep::Completed { order_id: 77 });
        assert!(cart.state().is_empty());
    }

    #[tokio::test]
    async fn test_failed_submission_keeps_cart_and_allows_retry() {
        let mut cart = cart_worth_100().await;
        let api = FakeApi { fail: true, ..FakeApi::default() };
        let mut checkout = at_payment_step(PaymentMethod::CashOnDelivery).await;

        assert!(matches!(checkout.submit_payment(&mut cart, &api).await, Err(CheckoutError::Api(_))));
        assert_eq!(checkout.step(), &CheckoutStep::SelectingPayment);
        assert_eq!(checkout.last_error(), Some("Payment failed, please try again"));
        assert_eq!(cart.state().total_items(), 4);

        let ok = FakeApi::default();
        assert!(checkout.submit_payment(&mut cart, &ok).await.is_ok());
        assert_eq!(checkout.last_error(), None);
    }

    #[tokio::test]
    async fn test_unverified_return_lands_on_failure() {
        let mut cart = cart_worth_100().await;
        let api = FakeApi { fail: true, ..FakeApi::default() };
        let mut checkout = Checkout::new();
        let ret = GatewayReturn { payment_id: "p".into(), order_ref: "r".into() };
        assert!(matches!(checkout.confirm_gateway_return(&ret, &mut cart, &api).await, CheckoutStep::Failed { .. }));
        assert!(!cart.state().is_empty());
    }

    #[test]
    fn test_gateway_return_needs_both_ids() {
        assert!(GatewayReturn::from_url("http://shop.test/checkout/success?order_id=abc").is_none());
        assert!(GatewayReturn::from_url("not a url").is_none());
        let ret = GatewayReturn::from_url("http://shop.test/checkout/success?order_id=abc&payment_id=xyz").unwrap();
        assert_eq!(ret, GatewayReturn { payment_id: "xyz".into(), order_ref: "abc".into() });
    }

    #[tokio::test]
    async fn test_submit_needs_method_and_items() {
        let mut cart = CartStore::new(Arc::new(MemoryStorage::new()));
        cart.hydrate().await;
        let api = FakeApi::default();
        let mut checkout = Checkout::new();
        checkout.submit_shipping(shipping()).unwrap();
        assert!(matches!(checkout.submit_payment(&mut cart, &api).await, Err(CheckoutError::NoPaymentMethod)));
        checkout.select_payment_method(PaymentMethod::CashOnDelivery).unwrap();
        assert!(matches!(checkout.submit_payment(&mut cart, &api).await, Err(CheckoutError::EmptyCart)));
    }
}
