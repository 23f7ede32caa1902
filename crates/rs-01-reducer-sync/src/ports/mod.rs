//! Ports module for Reducer Sync
//!
//! Defines inbound (API) and outbound (SPI) port traits.

pub mod inbound;
pub mod outbound;

pub use inbound::ReducerSyncApi;
pub use outbound::{
    ChainProvider, ChainProviderFactory, NextResponseStream, Reducer, ReducerStateStore,
};
