// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Subcommand implementations.

pub(crate) mod pending;
pub(crate) mod send;
pub(crate) mod watch;
