//! Hesabe payment-gateway integration.

pub mod client;

pub use client::{
    sign_with_secret, GatewayError, HesabeClient, RefundRequest, RefundResponse, SignedEnvelope,
};
