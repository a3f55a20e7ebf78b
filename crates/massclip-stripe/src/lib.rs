//! Stripe client for the MassClip backend.
//!
//! This crate provides:
//! - A form-encoded REST client for Connect accounts, products, prices,
//!   Checkout sessions, balances and payouts
//! - The [`PaymentGateway`] seam the API services depend on
//! - Webhook signature verification and event decoding

pub mod client;
pub mod config;
pub mod error;
pub mod gateway;
pub mod types;
pub mod webhook;

pub use client::StripeClient;
pub use config::StripeConfig;
pub use error::{StripeError, StripeResult};
pub use gateway::{PaymentGateway, SharedGateway};
pub use types::{
    Account, AccountLink, AccountRequirementsRaw, Balance, BalanceAmount, BalanceTransaction,
    Charge, CheckoutSession, CheckoutSessionParams, DateOfBirth, IdentitySubmission, Invoice,
    List, Payout, Price, Product, Subscription,
};
pub use webhook::{construct_event, parse_event, verify_signature, EventKind, WebhookEvent};
