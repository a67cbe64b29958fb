use std::str::FromStr;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Json, Query};
use axum::http::StatusCode;
use chrono::NaiveDate;
use serde::Deserialize;

use stockroom_core::DomainError;
use stockroom_infra::{DateRange, MovementFilter, Pagination, ProductFilter};
use stockroom_ledger::MovementKind;

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl PageQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::from_page(self.page, self.per_page)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductListQuery {
    pub name: Option<String>,
    pub sku: Option<String>,
    pub category: Option<String>,
    pub supplier: Option<String>,
    pub low_stock: Option<bool>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl ProductListQuery {
    pub fn filter(&self) -> Result<ProductFilter, axum::response::Response> {
        Ok(ProductFilter {
            name: non_blank(&self.name),
            sku: non_blank(&self.sku),
            category: parse_optional_id(&self.category, "category")?,
            supplier: parse_optional_id(&self.supplier, "supplier")?,
            low_stock: self.low_stock.unwrap_or(false),
        })
    }

    pub fn pagination(&self) -> Pagination {
        Pagination::from_page(self.page, self.per_page)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct MovementListQuery {
    pub product: Option<String>,
    pub kind: Option<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl MovementListQuery {
    pub fn filter(&self) -> Result<MovementFilter, axum::response::Response> {
        let kind = match non_blank(&self.kind) {
            Some(raw) => Some(raw.parse::<MovementKind>().map_err(errors::domain_error_to_response)?),
            None => None,
        };
        Ok(MovementFilter {
            product: parse_optional_id(&self.product, "product")?,
            kind,
            range: date_range(self.start, self.end)?,
        })
    }

    pub fn pagination(&self) -> Pagination {
        Pagination::from_page(self.page, self.per_page)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DateRangeQuery {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRangeQuery {
    pub fn range(&self) -> Result<DateRange, axum::response::Response> {
        date_range(self.start, self.end)
    }
}

/// Body of `POST /products/:id/entries` and `/exits`.
#[derive(Debug, Deserialize)]
pub struct MovementBody {
    pub quantity: i64,
    #[serde(default)]
    pub reason: String,
}

/// Body of `PUT /products/:id/baseline`.
#[derive(Debug, Deserialize)]
pub struct BaselineBody {
    pub stock: i64,
}

// -------------------------
// Extraction helpers
// -------------------------

/// Unwraps a JSON body, turning axum's rejection into a 400 error body.
pub fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, axum::response::Response> {
    body.map(|Json(value)| value)
        .map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, "validation", e.body_text()))
}

pub fn query<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, axum::response::Response> {
    query
        .map(|Query(value)| value)
        .map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, "validation", e.body_text()))
}

pub fn parse_id<T>(raw: &str) -> Result<T, axum::response::Response>
where
    T: FromStr<Err = DomainError>,
{
    raw.trim().parse().map_err(errors::domain_error_to_response)
}

fn parse_optional_id<T>(raw: &Option<String>, field: &str) -> Result<Option<T>, axum::response::Response>
where
    T: FromStr<Err = DomainError>,
{
    match non_blank(raw) {
        Some(value) => value.parse().map(Some).map_err(|_| {
            errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid {field} id"))
        }),
        None => Ok(None),
    }
}

fn non_blank(raw: &Option<String>) -> Option<String> {
    raw.as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn date_range(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<DateRange, axum::response::Response> {
    if let (Some(s), Some(e)) = (start, end) {
        if s > e {
            return Err(errors::json_error(
                StatusCode::BAD_REQUEST,
                "validation",
                "start must not be after end",
            ));
        }
    }
    Ok(DateRange::new(start, end))
}
