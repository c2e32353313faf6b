// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use thiserror::Error;

/// Fatal playlist-parse failures. A failed parse returns early and leaves
/// whatever catalog the caller already holds untouched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlaylistError {
    #[error("invalid M3U playlist: missing #EXTM3U header")]
    MissingHeader,
}

/// Login rejections reported by an Xtream provider. The three kinds are
/// distinct: `auth = 0` means bad credentials, while `status` can report a
/// disabled or expired account even when `auth = 1`.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("authentication failed: invalid username or password")]
    InvalidCredentials,
    #[error("account is disabled")]
    Disabled,
    #[error("account has expired")]
    Expired,
}

/// Failures raised by the HTTP fetch collaborator.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error("empty response from server")]
    EmptyResponse,
    #[error("failed to decompress response body: {0}")]
    Decompress(#[from] std::io::Error),
}

/// Errors that abort an Xtream `login` or `load_all` call. Individual listing
/// failures after a successful login are absorbed, never surfaced here.
#[derive(Debug, Error)]
pub enum XtreamError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("failed to parse server response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid server URL: {0}")]
    InvalidServer(#[from] url::ParseError),
    #[error("invalid credentials or server response")]
    MalformedLogin,
}
