//! Plain-HTTP form filler.
//!
//! GETs the petition page, finds the first form the mapping can fill, and
//! submits it the way a browser would (form method, resolved action).
//! Pages that need JavaScript to render their form come back as
//! "no fillable form" failures.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, Url};
use tracing::{debug, info};

use super::form::{choose_form, has_submit, parse_forms, FormMethod};
use super::{AttemptOutcome, FormFiller};
use crate::error::AutomationError;
use crate::pipeline::field_mapper::FieldMapping;

/// Per-request timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36";

/// [`FormFiller`] over `reqwest`.
pub struct HttpFormFiller {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFormFiller {
    pub fn new() -> Result<Self, AutomationError> {
        Self::with_timeout(REQUEST_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, AutomationError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| AutomationError::Unavailable(e.to_string()))?;
        Ok(Self { client, timeout })
    }

    fn request_error(&self, url: &Url, e: reqwest::Error) -> AutomationError {
        if e.is_timeout() {
            AutomationError::Timeout {
                url: url.to_string(),
                timeout: self.timeout,
            }
        } else {
            AutomationError::Request {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl FormFiller for HttpFormFiller {
    async fn attempt(
        &self,
        url: &str,
        fields: &FieldMapping,
    ) -> Result<AttemptOutcome, AutomationError> {
        let page_url = Url::parse(url).map_err(|e| AutomationError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let resp = self
            .client
            .get(page_url.clone())
            .send()
            .await
            .map_err(|e| self.request_error(&page_url, e))?;
        let status = resp.status();
        if !status.is_success() {
            return Ok(AttemptOutcome::failed(format!("Page returned HTTP {status}")));
        }
        // Relative actions resolve against the post-redirect URL.
        let base = resp.url().clone();
        let html = resp
            .text()
            .await
            .map_err(|e| self.request_error(&page_url, e))?;

        let forms = parse_forms(&html);
        debug!(url = %base, forms = forms.len(), "Fetched petition page");

        let Some((form, submission)) = choose_form(&forms, fields) else {
            return Ok(AttemptOutcome::failed("No fillable form found on page"));
        };
        if !has_submit(form) {
            return Ok(AttemptOutcome::failed("Could not find submit button"));
        }

        let action = match form.action.as_deref() {
            Some(action) => base.join(action).map_err(|e| AutomationError::InvalidUrl {
                url: action.to_string(),
                reason: e.to_string(),
            })?,
            None => base.clone(),
        };

        let request = match form.method {
            FormMethod::Post => self
                .client
                .request(Method::POST, action.clone())
                .form(&submission.pairs),
            FormMethod::Get => self
                .client
                .request(Method::GET, action.clone())
                .query(&submission.pairs),
        };
        let resp = request
            .send()
            .await
            .map_err(|e| self.request_error(&action, e))?;

        let status = resp.status();
        if !status.is_success() {
            return Ok(AttemptOutcome::failed(format!(
                "Filled {} fields but submission returned HTTP {status}",
                submission.filled
            )));
        }

        info!(url = %action, filled = submission.filled, "Petition form submitted");
        Ok(AttemptOutcome::signed(format!(
            "Filled {} fields and submitted",
            submission.filled
        )))
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn fields(entries: &[(&str, &str)]) -> FieldMapping {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    async fn page(server: &MockServer, at: &str, html: &str) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(ResponseTemplate::new(200).set_body_string(html.to_string()))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn posts_filled_form_to_relative_action() {
        let server = MockServer::start().await;
        page(
            &server,
            "/petitions/park",
            r#"<form action="sign" method="post">
                 <input type="hidden" name="token" value="t1">
                 <input name="first_name"><input name="postal">
                 <input type="submit" value="Sign">
               </form>"#,
        )
        .await;
        Mock::given(method("POST"))
            .and(path("/petitions/sign"))
            .and(body_string_contains("first_name=Ada"))
            .and(body_string_contains("postal=12345"))
            .and(body_string_contains("token=t1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Thanks"))
            .expect(1)
            .mount(&server)
            .await;

        let filler = HttpFormFiller::new().unwrap();
        let outcome = filler
            .attempt(
                &format!("{}/petitions/park", server.uri()),
                &fields(&[("first_name", "Ada"), ("postal", "12345")]),
            )
            .await
            .unwrap();

        assert!(outcome.success, "message = {}", outcome.message);
        assert_eq!(outcome.message, "Filled 2 fields and submitted");
    }

    #[tokio::test]
    async fn get_form_submits_query() {
        let server = MockServer::start().await;
        page(
            &server,
            "/p",
            r#"<form action="/go"><input name="email"><button>Sign</button></form>"#,
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/go"))
            .and(query_param("email", "ada@example.org"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let filler = HttpFormFiller::new().unwrap();
        let outcome = filler
            .attempt(
                &format!("{}/p", server.uri()),
                &fields(&[("email", "ada@example.org")]),
            )
            .await
            .unwrap();
        assert!(outcome.success);
    }

    #[tokio::test]
    async fn page_without_form_is_a_failed_outcome() {
        let server = MockServer::start().await;
        page(&server, "/p", "<p>Thanks for your support</p>").await;

        let filler = HttpFormFiller::new().unwrap();
        let outcome = filler
            .attempt(&format!("{}/p", server.uri()), &fields(&[("email", "a@b.org")]))
            .await
            .unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.message, "No fillable form found on page");
    }

    #[tokio::test]
    async fn form_without_submit_control() {
        let server = MockServer::start().await;
        page(&server, "/p", r#"<form><input name="email"></form>"#).await;

        let filler = HttpFormFiller::new().unwrap();
        let outcome = filler
            .attempt(&format!("{}/p", server.uri()), &fields(&[("email", "a@b.org")]))
            .await
            .unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.message, "Could not find submit button");
    }

    #[tokio::test]
    async fn http_error_page_is_a_failed_outcome() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let filler = HttpFormFiller::new().unwrap();
        let outcome = filler
            .attempt(&format!("{}/gone", server.uri()), &fields(&[("email", "a@b.org")]))
            .await
            .unwrap();
        assert!(!outcome.success);
        assert!(outcome.message.contains("404"));
    }

    #[tokio::test]
    async fn invalid_url_is_an_error() {
        let filler = HttpFormFiller::new().unwrap();
        let err = filler
            .attempt("not a url", &fields(&[("email", "a@b.org")]))
            .await
            .unwrap_err();
        assert!(matches!(err, AutomationError::InvalidUrl { .. }));
    }

    #[tokio::test]
    async fn slow_page_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let filler = HttpFormFiller::with_timeout(Duration::from_millis(200)).unwrap();
        let err = filler
            .attempt(&format!("{}/slow", server.uri()), &fields(&[("email", "a@b.org")]))
            .await
            .unwrap_err();
        assert!(matches!(err, AutomationError::Timeout { .. }), "err = {err}");
    }
}
