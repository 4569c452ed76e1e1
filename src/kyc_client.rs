use crate::errors::AppError;
use crate::models::{CustomerRecord, CustomerStatus};
use crate::services::{KycService, ServiceCredentials};
use async_trait::async_trait;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::LazyLock;

const CUSTOMER_NAMESPACE: &str = "http://credable.io/cbs/customer";

static CUSTOMER_ELEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<(?:[\w.-]+:)?customer(?:\s[^>]*)?>(.*?)</(?:[\w.-]+:)?customer\s*>")
        .expect("customer element pattern is valid")
});

static CUSTOMER_NUMBER_FIELD: LazyLock<Regex> = LazyLock::new(|| child_pattern("customerNumber"));
static STATUS_FIELD: LazyLock<Regex> = LazyLock::new(|| child_pattern("status"));
static MONTHLY_INCOME_FIELD: LazyLock<Regex> = LazyLock::new(|| child_pattern("monthlyIncome"));

fn child_pattern(name: &str) -> Regex {
    Regex::new(&format!(
        r"<(?:[\w.-]+:)?{name}(?:\s[^>]*)?>([^<]*)</(?:[\w.-]+:)?{name}\s*>"
    ))
    .expect("child element pattern is valid")
}

/// Client for the SOAP customer (KYC) service.
#[derive(Clone)]
pub struct SoapKycClient {
    client: reqwest::Client,
    base_url: String,
    credentials: ServiceCredentials,
}

impl SoapKycClient {
    pub fn new(client: reqwest::Client, base_url: String, credentials: ServiceCredentials) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        }
    }

    async fn fetch(&self, customer_number: &str) -> Result<String, AppError> {
        let url = format!("{}/service/customer", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "text/xml")
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .body(customer_request_envelope(customer_number))
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("KYC request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::ExternalApiError(format!(
                "KYC service returned status {}",
                response.status()
            )));
        }

        response
            .text()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Failed to read KYC response: {}", e)))
    }
}

#[async_trait]
impl KycService for SoapKycClient {
    async fn lookup(&self, customer_number: &str) -> Result<Option<CustomerRecord>, AppError> {
        tracing::info!("KYC: Looking up customer {}", customer_number);

        let body = match self.fetch(customer_number).await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!("KYC unavailable for {}: {}", customer_number, e);
                return Ok(None);
            }
        };

        match parse_customer_response(&body) {
            Some(record) => {
                tracing::info!(
                    "KYC: Customer {} is {:?}",
                    record.customer_number,
                    record.status
                );
                Ok(Some(record))
            }
            None => {
                tracing::warn!("KYC: Unparsable response for {}", customer_number);
                Ok(None)
            }
        }
    }
}

/// Builds the SOAP 1.1 `CustomerRequest` envelope.
pub fn customer_request_envelope(customer_number: &str) -> String {
    format!(
        r#"<?xml version="1.0"?>
<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/" xmlns:cust="{ns}">
   <soapenv:Header/>
   <soapenv:Body>
      <cust:CustomerRequest>
         <cust:customerNumber>{customer}</cust:customerNumber>
      </cust:CustomerRequest>
   </soapenv:Body>
</soapenv:Envelope>"#,
        ns = CUSTOMER_NAMESPACE,
        customer = escape_xml(customer_number)
    )
}

/// Extracts the `customer` element from a SOAP response.
///
/// Returns `None` when the element is missing or `monthlyIncome` is negative or
/// not a number. A missing income is read as zero.
pub fn parse_customer_response(body: &str) -> Option<CustomerRecord> {
    let customer = CUSTOMER_ELEMENT.captures(body)?.get(1)?.as_str();

    let customer_number = child_text(customer, &CUSTOMER_NUMBER_FIELD).unwrap_or_default();
    let status = child_text(customer, &STATUS_FIELD).unwrap_or_default();
    let monthly_income = match child_text(customer, &MONTHLY_INCOME_FIELD) {
        Some(raw) if !raw.is_empty() => Decimal::from_str(&raw).ok()?,
        _ => Decimal::ZERO,
    };

    if monthly_income.is_sign_negative() && !monthly_income.is_zero() {
        return None;
    }

    Some(CustomerRecord {
        customer_number,
        status: CustomerStatus::from_kyc(&status),
        monthly_income,
    })
}

fn child_text(xml: &str, field: &Regex) -> Option<String> {
    field
        .captures(xml)
        .and_then(|c| c.get(1))
        .map(|m| unescape_xml(m.as_str().trim()))
}

fn escape_xml(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn unescape_xml(raw: &str) -> String {
    raw.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
