// ── Device seam ──
//
// The engine talks to the router only through `FilterDevice`. Every method is
// a single, independently idempotent operation; there are no transactions.

mod cli;

use std::collections::BTreeSet;
use std::future::Future;

use thiserror::Error;

use crate::model::{Direction, FilterTable, RulePayload};

pub use cli::{CliFilterDevice, bind_command, define_command, delete_command, unbind_command};

/// Failure of one device operation.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The addressed entry or binding does not exist.
    #[error("not found on the router")]
    NotFound,

    /// The router answered, but not in a form this adapter understands.
    #[error("unexpected router output: {message}")]
    UnexpectedOutput { message: String },

    /// The operation itself was refused or is not possible.
    #[error("{message}")]
    Operation { message: String },

    #[error(transparent)]
    Transport(#[from] filterctl_api::Error),
}

impl DeviceError {
    /// Whether this failure means "does not exist".
    ///
    /// Deletes treat it as success, reads as absence.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound => true,
            Self::Transport(err) => err.is_not_found(),
            _ => false,
        }
    }
}

/// Operations the engine needs from a router's numbered filter tables.
///
/// Calls are issued strictly one after another; implementations never see
/// concurrent calls from a single lifecycle operation.
pub trait FilterDevice: Send + Sync {
    type Payload: RulePayload;

    /// Create or overwrite entry `number`.
    fn define_entry(
        &self,
        table: FilterTable,
        number: u32,
        payload: &Self::Payload,
    ) -> impl Future<Output = Result<(), DeviceError>> + Send;

    /// Remove entry `number`; a missing entry reports [`DeviceError::NotFound`].
    fn delete_entry(
        &self,
        table: FilterTable,
        number: u32,
    ) -> impl Future<Output = Result<(), DeviceError>> + Send;

    /// Read entry `number`; a missing entry reports [`DeviceError::NotFound`].
    fn get_entry(
        &self,
        table: FilterTable,
        number: u32,
    ) -> impl Future<Output = Result<Self::Payload, DeviceError>> + Send;

    /// Replace the filter list bound to `interface`/`direction`.
    fn bind_interface_filters(
        &self,
        table: FilterTable,
        interface: &str,
        direction: Direction,
        numbers: &[u32],
    ) -> impl Future<Output = Result<(), DeviceError>> + Send;

    /// Remove the filter list bound to `interface`/`direction`.
    fn unbind_interface_filters(
        &self,
        table: FilterTable,
        interface: &str,
        direction: Direction,
    ) -> impl Future<Output = Result<(), DeviceError>> + Send;

    /// Filter numbers currently bound to `interface`/`direction`, in order.
    fn list_interface_filters(
        &self,
        table: FilterTable,
        interface: &str,
        direction: Direction,
    ) -> impl Future<Output = Result<Vec<u32>, DeviceError>> + Send;

    /// Every entry number present in `table`.
    fn list_entry_numbers(
        &self,
        table: FilterTable,
    ) -> impl Future<Output = Result<BTreeSet<u32>, DeviceError>> + Send;

    /// Persist the running configuration. The default does nothing.
    fn save(&self) -> impl Future<Output = Result<(), DeviceError>> + Send {
        async { Ok(()) }
    }
}
