// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Test harness for tip intake abuse simulation.
//!
//! Provides in-test collaborators, payload generators, abuse scenarios and
//! outcome metrics shared by the integration, HTTP and security tests.

#![allow(dead_code)]

pub mod attacks;
pub mod fixtures;
pub mod generators;
pub mod metrics;
