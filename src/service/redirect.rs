use crate::domain::transaction::GatewayTransactionDetail;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RedirectStatus {
    Success,
    Error,
    Cancel,
}

/// Where the payer's browser goes next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedirectTarget {
    pub status: RedirectStatus,
    pub url: String,
}

/// Appends form-encoded pairs to `base`, joining with `?` or `&` as needed.
pub fn with_query<'a>(base: &str, pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish();
    if query.is_empty() {
        return base.to_string();
    }
    let sep = if base.contains('?') { '&' } else { '?' };
    format!("{base}{sep}{query}")
}

pub fn success_target(
    base: &str,
    session_key: &str,
    detail: &GatewayTransactionDetail,
    card: Option<(&str, &str)>,
) -> RedirectTarget {
    let mut pairs: Vec<(&str, &str)> = vec![("success", "1")];
    if let Some((token, approval)) = card {
        pairs.push(("token", token));
        pairs.push(("authNo", approval));
    }
    pairs.extend(detail.query_pairs());
    pairs.push(("session_key", session_key));
    RedirectTarget {
        status: RedirectStatus::Success,
        url: with_query(base, pairs),
    }
}

/// Failure URL with `error=<message>`; unchanged when there is no message.
pub fn failure_target(base: &str, message: &str) -> RedirectTarget {
    let url = if message.is_empty() {
        base.to_string()
    } else {
        with_query(base, [("error", message)])
    };
    RedirectTarget {
        status: RedirectStatus::Error,
        url,
    }
}

pub fn cancel_target(base: &str) -> RedirectTarget {
    RedirectTarget {
        status: RedirectStatus::Cancel,
        url: base.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_separator() {
        assert_eq!(with_query("https://a.example/ok", [("x", "1")]), "https://a.example/ok?x=1");
        assert_eq!(
            with_query("https://a.example/ok?lang=he", [("x", "1")]),
            "https://a.example/ok?lang=he&x=1"
        );
    }

    #[test]
    fn success_starts_with_flag() {
        let detail = GatewayTransactionDetail {
            transaction_id: Some("tx 1".to_string()),
            ..Default::default()
        };
        let t = success_target("https://a.example/ok", "k-1", &detail, Some(("tok", "0042")));
        assert_eq!(
            t.url,
            "https://a.example/ok?success=1&token=tok&authNo=0042&transaction_id=tx+1&session_key=k-1"
        );
    }

    #[test]
    fn failure_encodes_message() {
        let t = failure_target("https://a.example/fail?o=2", "Refusal by credit company.");
        assert_eq!(t.url, "https://a.example/fail?o=2&error=Refusal+by+credit+company.");
        assert_eq!(failure_target("https://a.example/fail", "").url, "https://a.example/fail");
    }
}
