mod hmac;

pub use hmac::{HmacMiddlewareFactory, HmacMiddlewareService, SETTLEMENT_HMAC_HEADER};
