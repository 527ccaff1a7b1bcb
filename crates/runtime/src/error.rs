// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the process runtime.

use hive_core::ServerId;
use hive_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GenServerError {
    #[error("call to {id} timed out after {timeout_ms}ms")]
    CallTimeout { id: ServerId, timeout_ms: u64 },

    #[error("server {id} is not running")]
    ServerNotRunning { id: ServerId },

    #[error("init failed: {message}")]
    InitializationError { message: String },

    #[error("name {name:?} is already registered")]
    AlreadyRegistered { name: String },

    #[error("server {id} has no persistence configured")]
    PersistenceNotConfigured { id: ServerId },

    #[error(transparent)]
    Persistence(#[from] StoreError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SupervisorError {
    #[error("restart intensity exceeded: {restarts} restarts in {within_ms}ms")]
    MaxRestartsExceeded { restarts: u32, within_ms: u64 },

    #[error("child {id:?} already exists")]
    DuplicateChild { id: String },

    #[error("child {id:?} not found")]
    ChildNotFound { id: String },

    #[error("simple_one_for_one requires a child template")]
    MissingChildTemplate,

    #[error("simple_one_for_one forbids static children")]
    InvalidSimpleOneForOne,

    #[error("child {id:?} failed to start: {source}")]
    ChildStart {
        id: String,
        #[source]
        source: GenServerError,
    },

    #[error("supervisor is not running")]
    NotRunning,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("key {key:?} is already registered")]
    AlreadyRegisteredKey { key: String },

    #[error("key {key:?} not found")]
    KeyNotFound { key: String },

    #[error("key {key:?} has multiple registrations; use lookup_all")]
    DuplicateKeyLookup { key: String },

    #[error("dispatch requires a duplicate-mode registry")]
    DispatchNotSupported,

    #[error("{server} is already registered under key {key:?}")]
    DuplicateRegistration { key: String, server: ServerId },
}
