//! Error Types
//!
//! This module defines the error types used throughout the engine.
//!
//! # Overview
//!
//! The main error type [`EngineError`] covers every fallible boundary in
//! the render graph, RHI, and scene core: contract violations (programmer
//! error), resource allocation failure, back-end driver error, and file
//! I/O / asset parsing. All public APIs return [`Result<T>`], which is an
//! alias for `std::result::Result<T, EngineError>`.

use thiserror::Error;

/// The main error type for the engine.
///
/// Mirrors the boolean-return-plus-log-message idiom of the original
/// design: every variant carries enough context to reconstruct the
/// `return_if_false`-style log line at the call site.
#[derive(Error, Debug)]
pub enum EngineError {
    // ========================================================================
    // Contract violations (programmer error)
    // ========================================================================
    /// `query_interface` requested an IID the object does not implement.
    #[error("query_interface: unsupported interface {iid:?} on {type_name}")]
    UnsupportedInterface {
        /// The interface ID that was requested.
        iid: crate::rhi::object::Iid,
        /// Concrete type name of the object being queried.
        type_name: &'static str,
    },

    /// A binding set's items did not match its layout's slots.
    #[error("binding set/layout mismatch: {0}")]
    BindingMismatch(String),

    /// `set_push_constants` was called with a buffer of the wrong size.
    #[error("push constant size mismatch: layout expects {expected} bytes, got {actual}")]
    PushConstantSizeMismatch {
        /// Size declared by the binding layout.
        expected: u32,
        /// Size of the buffer actually supplied.
        actual: u32,
    },

    /// The render graph's pass dependency relation contains a cycle.
    #[error("There is a cycle in the render graph's pass DAG")]
    RenderGraphCycle,

    /// A resource-cache name collided with an existing entry.
    #[error("resource cache name collision: {0}")]
    ResourceCacheCollision(String),

    /// A resource-cache lookup found nothing under the given name.
    #[error("resource cache miss: {0}")]
    ResourceCacheMiss(String),

    // ========================================================================
    // Resource allocation failure
    // ========================================================================
    /// The descriptor heap has no contiguous run of the requested size.
    #[error("descriptor heap exhausted: requested {requested} descriptors, {available} free")]
    DescriptorHeapExhausted {
        /// Number of descriptors requested.
        requested: u32,
        /// Number of descriptors actually free.
        available: u32,
    },

    /// GPU memory allocation failed.
    #[error("GPU allocation failed: {0}")]
    AllocationFailed(String),

    /// The device was lost (driver reset, hardware removal, etc.).
    #[error("device lost: {0}")]
    DeviceLost(String),

    // ========================================================================
    // Back-end driver error
    // ========================================================================
    /// Failed to request a compatible GPU adapter.
    #[error("failed to request a GPU adapter: {0}")]
    AdapterRequestFailed(String),

    /// Failed to create the GPU device.
    #[error("failed to create GPU device: {0}")]
    DeviceCreateFailed(#[from] wgpu::RequestDeviceError),

    /// A back-end API call returned a driver-level error.
    #[error("back-end driver error: {0}")]
    BackendError(String),

    // ========================================================================
    // File I/O / parsing
    // ========================================================================
    /// File I/O error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// An `.sdf`/`.sc` cache file's header did not match the compile-time
    /// resolution; the caller should schedule a full rebuild.
    #[error("cache resolution mismatch: file has {file_resolution}, expected {expected}")]
    CacheResolutionMismatch {
        /// Resolution recorded in the cache file header.
        file_resolution: u32,
        /// The compile-time resolution constant.
        expected: u32,
    },

    /// A required asset file is missing (fatal per spec §7).
    #[error("asset not found: {0}")]
    AssetNotFound(String),

    /// Malformed cache or asset file content.
    #[error("corrupt file: {0}")]
    CorruptFile(String),
}

/// Alias for `Result<T, EngineError>`.
pub type Result<T> = std::result::Result<T, EngineError>;
