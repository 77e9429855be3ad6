// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Commerce adapter over the platform's admin REST API

use super::{
    CommerceError, CommercePlatform, DiscountRequest, PlatformCustomer, PlatformOrder,
    ProfileUpdate, METAFIELD_NAMESPACE, POINTS_KEY, TIER_KEY,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

const TOKEN_HEADER: &str = "X-Shopify-Access-Token";

/// HTTP adapter. Requests are blocking `ureq` calls moved onto the
/// blocking pool.
#[derive(Clone)]
pub struct HttpCommerceAdapter {
    agent: ureq::Agent,
    base_url: Arc<str>,
    access_token: Arc<str>,
}

impl HttpCommerceAdapter {
    pub fn new(base_url: &str, access_token: &str, timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
            base_url: Arc::from(base_url.trim_end_matches('/')),
            access_token: Arc::from(access_token),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T, CommerceError> {
        let mut request = self
            .agent
            .get(&self.url(path))
            .header(TOKEN_HEADER, &*self.access_token);
        for (key, value) in query {
            request = request.query(*key, *value);
        }
        let mut response = request.call().map_err(|e| map_ureq(e, path))?;
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| CommerceError::Transport(e.to_string()))?;
        serde_json::from_str(&body).map_err(|e| CommerceError::Malformed(e.to_string()))
    }

    fn send<T: DeserializeOwned>(&self, method: Method, path: &str, body: Value) -> Result<T, CommerceError> {
        let url = self.url(path);
        let request = match method {
            Method::Post => self.agent.post(&url),
            Method::Put => self.agent.put(&url),
        };
        let mut response = request
            .header(TOKEN_HEADER, &*self.access_token)
            .header("Content-Type", "application/json")
            .send(body.to_string())
            .map_err(|e| map_ureq(e, path))?;
        let text = response
            .body_mut()
            .read_to_string()
            .map_err(|e| CommerceError::Transport(e.to_string()))?;
        if text.trim().is_empty() {
            return serde_json::from_value(Value::Null)
                .map_err(|e| CommerceError::Malformed(e.to_string()));
        }
        serde_json::from_str(&text).map_err(|e| CommerceError::Malformed(e.to_string()))
    }

    fn delete(&self, path: &str) -> Result<(), CommerceError> {
        self.agent
            .delete(&self.url(path))
            .header(TOKEN_HEADER, &*self.access_token)
            .call()
            .map_err(|e| map_ureq(e, path))?;
        Ok(())
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, CommerceError>
    where
        T: Send + 'static,
        F: FnOnce(Self) -> Result<T, CommerceError> + Send + 'static,
    {
        let this = self.clone();
        tokio::task::spawn_blocking(move || f(this))
            .await
            .map_err(|e| CommerceError::Transport(format!("blocking task failed: {}", e)))?
    }
}

/// Create a price rule, then its code. A rule whose code could not be
/// created is deleted again; if that fails too, its id is logged so it can
/// be removed by hand.
fn issue_with_rollback(
    create_rule: impl FnOnce() -> Result<u64, CommerceError>,
    create_code: impl FnOnce(u64) -> Result<String, CommerceError>,
    delete_rule: impl FnOnce(u64) -> Result<(), CommerceError>,
) -> Result<String, CommerceError> {
    let rule_id = create_rule()?;
    match create_code(rule_id) {
        Ok(code) => Ok(code),
        Err(e) => {
            match delete_rule(rule_id) {
                Ok(()) => tracing::warn!(
                    price_rule_id = rule_id,
                    error = %e,
                    "discount code failed; price rule removed"
                ),
                Err(undo) => tracing::error!(
                    price_rule_id = rule_id,
                    error = %e,
                    cleanup_error = %undo,
                    "discount code failed; orphaned price rule left on platform"
                ),
            }
            Err(e)
        }
    }
}

#[derive(Clone, Copy)]
enum Method {
    Post,
    Put,
}

fn map_ureq(error: ureq::Error, path: &str) -> CommerceError {
    match error {
        ureq::Error::StatusCode(404) => CommerceError::NotFound(path.to_string()),
        ureq::Error::StatusCode(code) => CommerceError::Status(code),
        other => CommerceError::Transport(other.to_string()),
    }
}

/// Parse a decimal money string ("237.5", "-12.00") into minor units
pub fn parse_minor(amount: &str) -> Result<i64, CommerceError> {
    let malformed = || CommerceError::Malformed(format!("invalid amount: {:?}", amount));
    let trimmed = amount.trim();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));
    if whole.is_empty() || frac.len() > 2 {
        return Err(malformed());
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }
    let whole: i64 = whole.parse().map_err(|_| malformed())?;
    let cents: i64 = match frac.len() {
        0 => 0,
        1 => frac.parse::<i64>().map_err(|_| malformed())? * 10,
        _ => frac.parse().map_err(|_| malformed())?,
    };
    let minor = whole
        .checked_mul(100)
        .and_then(|w| w.checked_add(cents))
        .ok_or_else(malformed)?;
    Ok(if negative { -minor } else { minor })
}

/// Format minor units as a decimal money string
pub fn format_minor(minor: i64) -> String {
    let sign = if minor < 0 { "-" } else { "" };
    let abs = minor.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

fn split_tags(tags: &str) -> Vec<String> {
    tags.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Deserialize)]
struct CustomerEnvelope {
    customer: CustomerWire,
}

#[derive(Deserialize)]
struct CustomerWire {
    id: u64,
    #[serde(default)]
    total_spent: Option<String>,
    #[serde(default)]
    tags: String,
}

#[derive(Deserialize)]
struct OrdersEnvelope {
    orders: Vec<OrderWire>,
}

#[derive(Deserialize)]
struct OrderWire {
    id: u64,
    name: String,
    total_price: String,
    currency: String,
    created_at: DateTime<Utc>,
}

impl OrderWire {
    fn into_order(self) -> Result<PlatformOrder, CommerceError> {
        Ok(PlatformOrder {
            external_id: self.id.to_string(),
            order_number: self.name,
            total_minor: parse_minor(&self.total_price)?,
            currency: self.currency,
            created_at: self.created_at,
        })
    }
}

#[derive(Deserialize)]
struct PriceRuleEnvelope {
    price_rule: IdWire,
}

#[derive(Deserialize)]
struct IdWire {
    id: u64,
}

#[derive(Deserialize)]
struct DiscountCodeEnvelope {
    discount_code: DiscountCodeWire,
}

#[derive(Deserialize)]
struct DiscountCodeWire {
    code: String,
}

/// Decode a customer response body
fn decode_customer(envelope: CustomerEnvelope) -> Result<PlatformCustomer, CommerceError> {
    let wire = envelope.customer;
    let lifetime_spend_minor = match wire.total_spent.as_deref() {
        Some(amount) => parse_minor(amount)?,
        None => 0,
    };
    Ok(PlatformCustomer {
        external_id: wire.id.to_string(),
        lifetime_spend_minor,
        tags: split_tags(&wire.tags),
    })
}

fn profile_body(external_customer_id: &str, update: &ProfileUpdate) -> Value {
    json!({
        "customer": {
            "id": external_customer_id,
            "tags": update.tags.join(", "),
            "metafields": [
                {
                    "namespace": METAFIELD_NAMESPACE,
                    "key": POINTS_KEY,
                    "value": update.points,
                    "type": "number_integer",
                },
                {
                    "namespace": METAFIELD_NAMESPACE,
                    "key": TIER_KEY,
                    "value": update.tier.label(),
                    "type": "single_line_text_field",
                },
            ],
        }
    })
}

fn price_rule_body(request: &DiscountRequest, now: DateTime<Utc>) -> Value {
    json!({
        "price_rule": {
            "title": request.title,
            "value_type": "fixed_amount",
            "value": format_minor(-request.value_minor),
            "customer_selection": "all",
            "target_type": "line_item",
            "target_selection": "all",
            "allocation_method": "across",
            "usage_limit": 1,
            "once_per_customer": true,
            "starts_at": now.to_rfc3339(),
        }
    })
}

fn discount_code() -> String {
    let raw = uuid::Uuid::new_v4().simple().to_string().to_uppercase();
    format!("LOY-{}", &raw[..10])
}

#[async_trait]
impl CommercePlatform for HttpCommerceAdapter {
    async fn get_customer(&self, external_id: &str) -> Result<PlatformCustomer, CommerceError> {
        let path = format!("customers/{}.json", external_id);
        self.blocking(move |this| decode_customer(this.get(&path, &[])?))
            .await
    }

    async fn get_orders(&self, external_id: &str) -> Result<Vec<PlatformOrder>, CommerceError> {
        let path = format!("customers/{}/orders.json", external_id);
        self.blocking(move |this| {
            let envelope: OrdersEnvelope = this.get(&path, &[("status", "any")])?;
            envelope.orders.into_iter().map(OrderWire::into_order).collect()
        })
        .await
    }

    async fn find_order_by_number(
        &self,
        order_number: &str,
    ) -> Result<Option<String>, CommerceError> {
        let number = order_number.to_string();
        self.blocking(move |this| {
            let envelope: OrdersEnvelope =
                this.get("orders.json", &[("name", number.as_str()), ("status", "any")])?;
            Ok(envelope.orders.first().map(|o| o.id.to_string()))
        })
        .await
    }

    async fn update_order_metafield(
        &self,
        external_order_id: &str,
        namespace: &str,
        key: &str,
        value: i64,
    ) -> Result<(), CommerceError> {
        let path = format!("orders/{}/metafields.json", external_order_id);
        let body = json!({
            "metafield": {
                "namespace": namespace,
                "key": key,
                "value": value,
                "type": "number_integer",
            }
        });
        self.blocking(move |this| {
            this.send::<Value>(Method::Post, &path, body)?;
            Ok(())
        })
        .await
    }

    async fn update_customer_profile(
        &self,
        external_customer_id: &str,
        update: &ProfileUpdate,
    ) -> Result<(), CommerceError> {
        let path = format!("customers/{}.json", external_customer_id);
        let body = profile_body(external_customer_id, update);
        self.blocking(move |this| {
            this.send::<Value>(Method::Put, &path, body)?;
            Ok(())
        })
        .await
    }

    async fn issue_discount_code(
        &self,
        request: &DiscountRequest,
    ) -> Result<String, CommerceError> {
        let rule_body = price_rule_body(request, Utc::now());
        self.blocking(move |this| {
            issue_with_rollback(
                || {
                    let rule: PriceRuleEnvelope =
                        this.send(Method::Post, "price_rules.json", rule_body)?;
                    Ok(rule.price_rule.id)
                },
                |rule_id| {
                    let path = format!("price_rules/{}/discount_codes.json", rule_id);
                    let created: DiscountCodeEnvelope = this.send(
                        Method::Post,
                        &path,
                        json!({ "discount_code": { "code": discount_code() } }),
                    )?;
                    Ok(created.discount_code.code)
                },
                |rule_id| this.delete(&format!("price_rules/{}.json", rule_id)),
            )
        })
        .await
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
