use bazaar_order_engine::{
    db_types::{Order, PaymentSession, PaymentTarget, ReconciliationEvent, Registration},
    traits::{GatewayError, GatewaySession, OrderFlowError, OrderManagement, PaymentGateway, SessionRequest},
};
use mockall::mock;

mock! {
    pub OrderManager {}
    impl OrderManagement for OrderManager {
        async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, OrderFlowError>;
        async fn fetch_order_by_reference(&self, reference: &str) -> Result<Option<Order>, OrderFlowError>;
        async fn fetch_orders_for_buyer(&self, buyer_id: i64) -> Result<Vec<Order>, OrderFlowError>;
        async fn fetch_orders_for_seller(&self, seller_id: i64) -> Result<Vec<Order>, OrderFlowError>;
        async fn fetch_registration(&self, registration_id: i64) -> Result<Option<Registration>, OrderFlowError>;
        async fn fetch_session_by_reference(&self, reference: &str) -> Result<Option<PaymentSession>, OrderFlowError>;
        async fn fetch_sessions_for_target(&self, target: PaymentTarget) -> Result<Vec<PaymentSession>, OrderFlowError>;
        async fn fetch_live_session(&self, target: PaymentTarget) -> Result<Option<PaymentSession>, OrderFlowError>;
    }
}

mock! {
    pub Gateway {}
    impl PaymentGateway for Gateway {
        async fn initialize(&self, request: SessionRequest) -> Result<GatewaySession, GatewayError>;
        async fn verify(&self, reference: &str) -> Result<ReconciliationEvent, GatewayError>;
        fn authenticate_webhook(&self, body: &[u8], signature: &str) -> Result<ReconciliationEvent, GatewayError>;
    }
}
