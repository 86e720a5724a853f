pub mod client;
pub mod models;

pub use client::{LndRestClient, MACAROON_HEADER};
pub use models::{
    AddInvoiceRequest, AddInvoiceResponse, ApiError, ChannelBalance, Invoice, ListInvoicesRequest,
    ListInvoicesResponse, ListPaymentsRequest, ListPaymentsResponse, NodeInfo, Payment,
    WalletBalance,
};
