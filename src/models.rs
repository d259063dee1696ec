// ABOUTME: Core domain types - the closed category enumeration and the transaction carrier
// ABOUTME: Category lookup is case-insensitive with canonical casing on the way out
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Fintel Budget Intelligence

//! # Domain Models
//!
//! [`Category`] is a closed 16-label enumeration; `Other` is always a valid
//! member and the mandated fallback for anything the categorizer cannot
//! place. [`Transaction`] is the carrier consumed by the batch categorizer.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Closed set of budget categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    /// Rent, mortgage, and other housing costs
    Housing,
    /// Commuting, fuel, rideshare, transit
    Transportation,
    /// Groceries and dining
    Food,
    /// Power, water, internet, phone
    Utilities,
    /// Insurance premiums of any kind
    Insurance,
    /// Medical and pharmacy spending
    Healthcare,
    /// Transfers into savings
    Savings,
    /// Personal care
    Personal,
    /// Streaming, events, hobbies
    Entertainment,
    /// Tuition, courses, books
    Education,
    /// Apparel
    Clothing,
    /// Gifts and donations
    Gifts,
    /// Flights, hotels, vacations
    Travel,
    /// Salary and other inflows
    Income,
    /// Brokerage and investment activity
    Investment,
    /// Fallback for anything unclassifiable
    Other,
}

impl Category {
    /// All categories, in canonical order
    pub const ALL: [Self; 16] = [
        Self::Housing,
        Self::Transportation,
        Self::Food,
        Self::Utilities,
        Self::Insurance,
        Self::Healthcare,
        Self::Savings,
        Self::Personal,
        Self::Entertainment,
        Self::Education,
        Self::Clothing,
        Self::Gifts,
        Self::Travel,
        Self::Income,
        Self::Investment,
        Self::Other,
    ];

    /// Canonical display name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Housing => "Housing",
            Self::Transportation => "Transportation",
            Self::Food => "Food",
            Self::Utilities => "Utilities",
            Self::Insurance => "Insurance",
            Self::Healthcare => "Healthcare",
            Self::Savings => "Savings",
            Self::Personal => "Personal",
            Self::Entertainment => "Entertainment",
            Self::Education => "Education",
            Self::Clothing => "Clothing",
            Self::Gifts => "Gifts",
            Self::Travel => "Travel",
            Self::Income => "Income",
            Self::Investment => "Investment",
            Self::Other => "Other",
        }
    }

    /// Case-insensitive lookup by name; surrounding whitespace is ignored
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single ledger transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique transaction id
    pub id: Uuid,
    /// Free-text description as imported
    pub description: String,
    /// Signed amount; negative values are outflows
    pub amount: f64,
    /// Posting date
    pub date: NaiveDate,
}

impl Transaction {
    /// Create a transaction with a fresh id
    #[must_use]
    pub fn new(description: impl Into<String>, amount: f64, date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            description: description.into(),
            amount,
            date,
        }
    }
}
