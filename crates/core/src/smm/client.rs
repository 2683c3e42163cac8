//! HTTP client for SMM panels speaking the common `api/v2` protocol.
//!
//! Every call is a form-encoded POST carrying the API key and an `action`.
//! Errors come back as HTTP 200 with an `{"error": "..."}` body.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::SmmPanelConfig;
use crate::metrics;

use super::{AddOrder, AddOrderResult, Balance, OrderStatusInfo, ServiceInfo, SmmError, SmmPanel};

/// SMM panel HTTP client.
pub struct PanelClient {
    client: Client,
    config: SmmPanelConfig,
}

impl PanelClient {
    /// Create a client. A missing API key is a configuration error.
    pub fn new(config: SmmPanelConfig) -> Result<Self, SmmError> {
        if config.api_key.trim().is_empty() {
            return Err(SmmError::NotConfigured("API key is not set".to_string()));
        }
        if config.url.trim().is_empty() {
            return Err(SmmError::NotConfigured("panel URL is not set".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| SmmError::Http(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// POST one action and return the raw body.
    async fn call(&self, action: &str, params: &[(&str, String)]) -> Result<String, SmmError> {
        let mut form: Vec<(&str, String)> = vec![
            ("key", self.config.api_key.clone()),
            ("action", action.to_string()),
        ];
        form.extend(params.iter().cloned());

        let start = Instant::now();
        let result = self.send(&form).await;

        metrics::EXTERNAL_SERVICE_DURATION
            .with_label_values(&["smm_panel", action])
            .observe(start.elapsed().as_secs_f64());
        metrics::EXTERNAL_SERVICE_REQUESTS
            .with_label_values(&[
                "smm_panel",
                action,
                if result.is_ok() { "success" } else { "error" },
            ])
            .inc();

        if let Err(e) = &result {
            warn!(action, error = %e, "SMM panel request failed");
        }
        result
    }

    async fn send(&self, form: &[(&str, String)]) -> Result<String, SmmError> {
        let response = self
            .client
            .post(&self.config.url)
            .form(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SmmError::Timeout
                } else if e.is_connect() {
                    SmmError::ConnectionFailed(e.to_string())
                } else {
                    SmmError::Http(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SmmError::Http(e.to_string()))?;

        // Some panels send errors with a non-2xx status; prefer the body's message.
        if !status.is_success() {
            if let Err(e @ SmmError::Panel { .. }) = check_panel_error(&body) {
                return Err(e);
            }
            return Err(SmmError::Http(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        Ok(body)
    }
}

/// Form fields for an "add" call. Drip parameters only when configured.
pub(crate) fn add_order_params(order: &AddOrder) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("service", order.service_id.clone()),
        ("link", order.link.clone()),
        ("quantity", order.quantity.to_string()),
    ];
    if let Some(drip) = order.drip_feed {
        if drip.runs > 0 {
            params.push(("runs", drip.runs.to_string()));
            params.push(("interval", drip.interval_minutes.to_string()));
        }
    }
    params
}

/// Fail with `Panel` when the body is an object carrying `error`.
fn check_panel_error(body: &str) -> Result<(), SmmError> {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: String,
    }

    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody { error }) => Err(SmmError::Panel {
            message: error,
            raw: body.to_string(),
        }),
        Err(_) => Ok(()),
    }
}

pub(crate) fn parse_response<T: DeserializeOwned>(body: &str) -> Result<T, SmmError> {
    check_panel_error(body)?;
    serde_json::from_str(body).map_err(|e| SmmError::InvalidResponse {
        message: e.to_string(),
        raw: body.to_string(),
    })
}

pub(crate) fn parse_add_order(body: &str) -> Result<AddOrderResult, SmmError> {
    #[derive(Deserialize)]
    struct OrderBody {
        order: serde_json::Value,
    }

    let parsed: OrderBody = parse_response(body)?;
    let order_id = match parsed.order {
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) if !s.is_empty() => s,
        other => {
            return Err(SmmError::InvalidResponse {
                message: format!("unexpected order id: {}", other),
                raw: body.to_string(),
            })
        }
    };

    Ok(AddOrderResult {
        order_id,
        raw: body.to_string(),
    })
}

#[async_trait]
impl SmmPanel for PanelClient {
    async fn balance(&self) -> Result<Balance, SmmError> {
        let body = self.call("balance", &[]).await?;
        parse_response(&body)
    }

    async fn services(&self) -> Result<Vec<ServiceInfo>, SmmError> {
        let body = self.call("services", &[]).await?;
        let services: Vec<ServiceInfo> = parse_response(&body)?;
        debug!(count = services.len(), "Fetched SMM service catalog");
        Ok(services)
    }

    async fn add_order(&self, order: &AddOrder) -> Result<AddOrderResult, SmmError> {
        let body = self.call("add", &add_order_params(order)).await?;
        parse_add_order(&body)
    }

    async fn order_status(&self, order_id: &str) -> Result<OrderStatusInfo, SmmError> {
        let body = self
            .call("status", &[("order", order_id.to_string())])
            .await?;
        parse_response(&body)
    }

    async fn order_statuses(
        &self,
        order_ids: &[String],
    ) -> Result<HashMap<String, OrderStatusInfo>, SmmError> {
        if order_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let body = self
            .call("status", &[("orders", order_ids.join(","))])
            .await?;
        parse_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smm::DripFeed;

    fn config(api_key: &str) -> SmmPanelConfig {
        SmmPanelConfig {
            url: "https://panel.example/api/v2".to_string(),
            api_key: api_key.to_string(),
            timeout_secs: 5,
        }
    }

    #[test]
    fn test_missing_api_key_is_not_configured() {
        assert!(matches!(
            PanelClient::new(config("  ")),
            Err(SmmError::NotConfigured(_))
        ));
        assert!(PanelClient::new(config("secret")).is_ok());
    }

    #[test]
    fn test_add_order_params_without_drip_feed() {
        let params = add_order_params(&AddOrder {
            service_id: "101".to_string(),
            link: "https://open.spotify.com/track/abc".to_string(),
            quantity: 1000,
            drip_feed: None,
        });
        let keys: Vec<_> = params.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec!["service", "link", "quantity"]);
    }

    #[test]
    fn test_add_order_params_with_drip_feed() {
        let params = add_order_params(&AddOrder {
            service_id: "101".to_string(),
            link: "x".to_string(),
            quantity: 500,
            drip_feed: Some(DripFeed {
                runs: 4,
                interval_minutes: 30,
            }),
        });
        assert!(params.contains(&("runs", "4".to_string())));
        assert!(params.contains(&("interval", "30".to_string())));
    }

    #[test]
    fn test_parse_add_order() {
        let result = parse_add_order(r#"{"order": 23501}"#).unwrap();
        assert_eq!(result.order_id, "23501");
        assert_eq!(result.raw, r#"{"order": 23501}"#);
    }

    #[test]
    fn test_parse_panel_error_keeps_raw() {
        let err = parse_add_order(r#"{"error": "Not enough funds on balance"}"#).unwrap_err();
        match &err {
            SmmError::Panel { message, .. } => assert_eq!(message, "Not enough funds on balance"),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(
            err.raw_response(),
            Some(r#"{"error": "Not enough funds on balance"}"#)
        );
    }

    #[test]
    fn test_parse_garbage_is_invalid_response() {
        assert!(matches!(
            parse_add_order("<html>502</html>"),
            Err(SmmError::InvalidResponse { .. })
        ));
    }

    #[test]
    fn test_parse_statuses_map() {
        let statuses: HashMap<String, OrderStatusInfo> = parse_response(
            r#"{"1": {"status": "Completed", "remains": "0"}, "10": {"error": "Incorrect order ID"}}"#,
        )
        .unwrap();
        assert_eq!(statuses["1"].status.as_deref(), Some("Completed"));
        assert_eq!(statuses["10"].error.as_deref(), Some("Incorrect order ID"));
    }

    mod http {
        use super::*;
        use wiremock::matchers::{body_string_contains, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        fn client_for(server: &MockServer, timeout_secs: u32) -> PanelClient {
            PanelClient::new(SmmPanelConfig {
                url: format!("{}/api/v2", server.uri()),
                api_key: "secret".to_string(),
                timeout_secs,
            })
            .unwrap()
        }

        fn single_order() -> AddOrder {
            AddOrder {
                service_id: "101".to_string(),
                link: "https://open.spotify.com/track/abc".to_string(),
                quantity: 1000,
                drip_feed: None,
            }
        }

        #[tokio::test]
        async fn test_add_order_posts_form_with_key_and_action() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/api/v2"))
                .and(body_string_contains("action=add"))
                .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"order": 23501}"#))
                .expect(1)
                .mount(&server)
                .await;

            let result = client_for(&server, 5)
                .add_order(&single_order())
                .await
                .unwrap();
            assert_eq!(result.order_id, "23501");

            let requests = server.received_requests().await.unwrap();
            let body = String::from_utf8(requests[0].body.clone()).unwrap();
            assert!(body.contains("key=secret"));
            assert!(body.contains("service=101"));
            assert!(body.contains("quantity=1000"));
            assert!(!body.contains("runs="));
            assert!(!body.contains("interval="));
        }

        #[tokio::test]
        async fn test_drip_feed_fields_are_sent() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(body_string_contains("runs=4"))
                .and(body_string_contains("interval=30"))
                .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"order": "77"}"#))
                .expect(1)
                .mount(&server)
                .await;

            let order = AddOrder {
                drip_feed: Some(DripFeed {
                    runs: 4,
                    interval_minutes: 30,
                }),
                ..single_order()
            };
            let result = client_for(&server, 5).add_order(&order).await.unwrap();
            assert_eq!(result.order_id, "77");
        }

        #[tokio::test]
        async fn test_error_body_on_non_2xx_is_panel_error() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .respond_with(
                    ResponseTemplate::new(400)
                        .set_body_string(r#"{"error": "Not enough funds on balance"}"#),
                )
                .mount(&server)
                .await;

            let err = client_for(&server, 5)
                .add_order(&single_order())
                .await
                .unwrap_err();
            match &err {
                SmmError::Panel { message, .. } => {
                    assert_eq!(message, "Not enough funds on balance")
                }
                other => panic!("unexpected error: {:?}", other),
            }
            assert!(err.raw_response().is_some());
        }

        #[tokio::test]
        async fn test_non_2xx_without_error_body_is_http_error() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"))
                .mount(&server)
                .await;

            let err = client_for(&server, 5).balance().await.unwrap_err();
            match err {
                SmmError::Http(message) => assert!(message.contains("502")),
                other => panic!("unexpected error: {:?}", other),
            }
        }

        #[tokio::test]
        async fn test_slow_panel_times_out() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_string(r#"{"order": 1}"#)
                        .set_delay(Duration::from_secs(3)),
                )
                .mount(&server)
                .await;

            let err = client_for(&server, 1)
                .add_order(&single_order())
                .await
                .unwrap_err();
            assert!(matches!(err, SmmError::Timeout));
        }

        #[tokio::test]
        async fn test_refused_connection_is_connection_failed() {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            let addr = listener.local_addr().unwrap();
            drop(listener);

            let client = PanelClient::new(SmmPanelConfig {
                url: format!("http://{}/api/v2", addr),
                api_key: "secret".to_string(),
                timeout_secs: 5,
            })
            .unwrap();
            let err = client.services().await.unwrap_err();
            assert!(matches!(err, SmmError::ConnectionFailed(_)));
        }

        #[tokio::test]
        async fn test_statuses_skip_the_call_for_no_orders() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
                .expect(0)
                .mount(&server)
                .await;

            let statuses = client_for(&server, 5).order_statuses(&[]).await.unwrap();
            assert!(statuses.is_empty());
        }
    }
}
