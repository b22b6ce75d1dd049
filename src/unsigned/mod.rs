mod builder;
mod components;

pub use builder::UnsignedTransactionBuilder;
pub use components::{NonceSource, SignedTransaction, TransactionIntent, UnsignedTransactionComponents};
