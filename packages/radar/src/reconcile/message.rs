//! Application signals from confirmation messages.
//!
//! Company and title come from `label: value` lines in the body first. Any
//! field still missing is taken from the subject line, trying a fixed list
//! of subject shapes in order.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use scraper::Html;
use serde::Deserialize;

use crate::types::ApplicationSignal;

/// A confirmation message as handed over by the mail collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct InboundMessage {
    pub id: String,

    #[serde(default)]
    pub subject: String,

    /// Plain text or HTML body.
    #[serde(default)]
    pub body: String,

    /// Raw RFC 2822 `Date` header.
    #[serde(default)]
    pub date: Option<String>,
}

#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static COMPANY_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:회사|기업)\s*명\s*[:：]\s*(.+)").expect("valid regex")
});

#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static TITLE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:(?:공고|지원|채용)\s*명|채용공고|지원\s*포지션|모집\s*부문|지원\s*(?:분야|직무))\s*[:：]\s*(.+)")
        .expect("valid regex")
});

#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static POSTING_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"rec_idx=(\d+)").expect("valid regex"));

/// Name the job portal puts in brackets on its own notices.
const PORTAL_NAME: &str = "사람인";

#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static PORTAL_SUBJECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\[{PORTAL_NAME}\]\s*(?P<company>.+?)에\s*입사지원")).expect("valid regex")
});

#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static BRACKET_SUBJECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[(?P<company>.+?)\]\s*(?P<title>.+?)\s*(?:지원\s*완료|입사지원)")
        .expect("valid regex")
});

#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static DASH_SUBJECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?P<company>.+?)\s*-\s*(?P<title>.+?)\s*(?:지원\s*완료|입사지원)")
        .expect("valid regex")
});

#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static QUOTED_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[\[『"'“](.+?)[\]』"'”]"#).expect("valid regex"));

/// Company and title found by one subject shape.
#[derive(Debug, Default, PartialEq, Eq)]
struct SubjectFields {
    company: Option<String>,
    title: Option<String>,
}

type SubjectParser = fn(&str) -> Option<SubjectFields>;

/// Subject shapes, most specific first.
const SUBJECT_PARSERS: &[(&str, SubjectParser)] = &[
    ("portal", portal_subject),
    ("bracket", bracket_subject),
    ("dash", dash_subject),
    ("quoted", quoted_subject),
];

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn named_groups(re: &Regex, subject: &str) -> Option<SubjectFields> {
    let caps = re.captures(subject)?;
    Some(SubjectFields {
        company: caps.name("company").and_then(|m| non_empty(m.as_str())),
        title: caps.name("title").and_then(|m| non_empty(m.as_str())),
    })
}

/// Drop a company that is just the portal's own bracket tag.
fn without_portal(mut fields: SubjectFields) -> Option<SubjectFields> {
    if fields.company.as_deref() == Some(PORTAL_NAME) {
        fields.company = None;
    }
    (fields.company.is_some() || fields.title.is_some()).then_some(fields)
}

fn portal_subject(subject: &str) -> Option<SubjectFields> {
    named_groups(&PORTAL_SUBJECT, subject)
}

fn bracket_subject(subject: &str) -> Option<SubjectFields> {
    named_groups(&BRACKET_SUBJECT, subject)
}

fn dash_subject(subject: &str) -> Option<SubjectFields> {
    named_groups(&DASH_SUBJECT, subject)
}

fn quoted_subject(subject: &str) -> Option<SubjectFields> {
    let mut spans = QUOTED_SPAN
        .captures_iter(subject)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str());
    let company = spans.next().and_then(non_empty)?;
    Some(SubjectFields {
        company: Some(company),
        title: spans.next().and_then(non_empty),
    })
}

/// Plain text of a body, with HTML reduced to one text node per line.
fn body_text(body: &str) -> String {
    if !body.contains("</") {
        return body.to_string();
    }
    Html::parse_fragment(body)
        .root_element()
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn label_fields(text: &str) -> (Option<String>, Option<String>) {
    let mut company = None;
    let mut title = None;

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if company.is_none() {
            if let Some(caps) = COMPANY_LINE.captures(line) {
                company = caps.get(1).and_then(|m| non_empty(m.as_str()));
                continue;
            }
        }
        if title.is_none() {
            if let Some(caps) = TITLE_LINE.captures(line) {
                title = caps.get(1).and_then(|m| non_empty(m.as_str()));
            }
        }
    }

    (company, title)
}

/// Parse one message into a signal.
///
/// Returns `None` (with a warning) when neither company nor title could be
/// found, even if a posting id was.
#[must_use]
pub fn parse_message(message: &InboundMessage) -> Option<ApplicationSignal> {
    let text = body_text(&message.body);
    let (mut company, mut title) = label_fields(&text);

    if company.is_none() || title.is_none() {
        let matched = SUBJECT_PARSERS
            .iter()
            .find_map(|(name, parse)| {
                parse(&message.subject)
                    .and_then(without_portal)
                    .map(|fields| (*name, fields))
            });
        if let Some((name, fields)) = matched {
            tracing::debug!(id = %message.id, pattern = name, "Subject pattern matched");
            company = company.or(fields.company);
            title = title.or(fields.title);
        }
    }

    if company.is_none() && title.is_none() {
        tracing::warn!(id = %message.id, subject = %message.subject, "No company or title in message, discarding signal");
        return None;
    }

    let posting_id = [message.body.as_str(), message.subject.as_str()]
        .into_iter()
        .find_map(|t| POSTING_ID.captures(t))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string());

    let observed_at = message.date.as_deref().and_then(|raw| {
        DateTime::parse_from_rfc2822(raw.trim())
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| tracing::debug!(id = %message.id, error = %e, "Unparsable message date"))
            .ok()
    });

    Some(ApplicationSignal {
        source_id: message.id.clone(),
        company,
        title,
        posting_id,
        observed_at,
        subject: message.subject.clone(),
    })
}

/// Parse every message, dropping those without company and title.
#[must_use]
pub fn parse_messages(messages: &[InboundMessage]) -> Vec<ApplicationSignal> {
    messages.iter().filter_map(parse_message).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn message(subject: &str, body: &str) -> InboundMessage {
        InboundMessage {
            id: "m1".into(),
            subject: subject.into(),
            body: body.into(),
            date: None,
        }
    }

    #[test]
    fn test_label_lines() {
        let body = "안녕하세요.\n회사명 : (주)카카오\n공고명: 데이터 엔지니어 채용\n감사합니다.";
        let signal = parse_message(&message("입사지원 완료 안내", body)).unwrap();
        assert_eq!(signal.company.as_deref(), Some("(주)카카오"));
        assert_eq!(signal.title.as_deref(), Some("데이터 엔지니어 채용"));
    }

    #[test]
    fn test_title_label_variants() {
        for line in ["지원분야: 백엔드", "모집부문 ： 백엔드", "채용공고: 백엔드", "지원 직무: 백엔드"] {
            let (_, title) = label_fields(line);
            assert_eq!(title.as_deref(), Some("백엔드"), "{line}");
        }
    }

    #[test]
    fn test_html_body() {
        let body = "<div><p>기업명: 네이버</p><p>지원포지션: 검색 개발</p></div>";
        let signal = parse_message(&message("", body)).unwrap();
        assert_eq!(signal.company.as_deref(), Some("네이버"));
        assert_eq!(signal.title.as_deref(), Some("검색 개발"));
    }

    #[test]
    fn test_portal_subject_gives_company() {
        let signal = parse_message(&message("[사람인] 강소테크에 입사지원이 완료되었습니다", "")).unwrap();
        assert_eq!(signal.company.as_deref(), Some("강소테크"));
        assert_eq!(signal.title, None);
    }

    #[test]
    fn test_portal_tag_is_not_a_company() {
        let msg = message("[사람인] 입사지원이 완료되었습니다", "");
        assert_eq!(parse_message(&msg), None);

        let msg = message("[사람인] 입사지원 안내", "공고명: 백엔드 개발");
        let signal = parse_message(&msg).unwrap();
        assert_eq!(signal.company, None);
        assert_eq!(signal.title.as_deref(), Some("백엔드 개발"));
    }

    #[test]
    fn test_bracket_subject() {
        let signal = parse_message(&message("[Acme] Backend Engineer 지원 완료", "")).unwrap();
        assert_eq!(signal.company.as_deref(), Some("Acme"));
        assert_eq!(signal.title.as_deref(), Some("Backend Engineer"));
    }

    #[test]
    fn test_dash_subject() {
        let signal = parse_message(&message("Globex - DevOps 입사지원", "")).unwrap();
        assert_eq!(signal.company.as_deref(), Some("Globex"));
        assert_eq!(signal.title.as_deref(), Some("DevOps"));
    }

    #[test]
    fn test_quoted_subject() {
        let signal = parse_message(&message("“Initech” 「x」 'QA Lead' 안내", "")).unwrap();
        assert_eq!(signal.company.as_deref(), Some("Initech"));
        assert_eq!(signal.title.as_deref(), Some("QA Lead"));
    }

    #[test]
    fn test_body_wins_over_subject() {
        let body = "회사명: 본문회사";
        let signal = parse_message(&message("[제목회사] 제목공고 지원완료", body)).unwrap();
        assert_eq!(signal.company.as_deref(), Some("본문회사"));
        assert_eq!(signal.title.as_deref(), Some("제목공고"));
    }

    #[test]
    fn test_posting_id_and_date() {
        let mut msg = message(
            "[Acme] Backend 지원완료",
            "https://www.saramin.co.kr/zf_user/jobs/relay/view?rec_idx=51234567",
        );
        msg.date = Some("Tue, 3 Jun 2025 10:15:00 +0900".into());
        let signal = parse_message(&msg).unwrap();
        assert_eq!(signal.posting_id.as_deref(), Some("51234567"));
        assert_eq!(
            signal.observed_at,
            Some(Utc.with_ymd_and_hms(2025, 6, 3, 1, 15, 0).unwrap())
        );
    }

    #[test]
    fn test_posting_id_from_html_link() {
        let body = r#"<p>회사명: Acme</p><a href="/zf_user/jobs/relay/view?rec_idx=77">공고 보기</a>"#;
        assert_eq!(parse_message(&message("", body)).unwrap().posting_id.as_deref(), Some("77"));
    }

    #[test]
    fn test_bad_date_is_unset() {
        let mut msg = message("[Acme] Backend 지원완료", "");
        msg.date = Some("yesterday".into());
        assert_eq!(parse_message(&msg).unwrap().observed_at, None);
    }

    #[test]
    fn test_signal_without_company_or_title_is_discarded() {
        let msg = message("지원 안내", "view?rec_idx=42");
        assert_eq!(parse_message(&msg), None);
        assert!(parse_messages(&[msg]).is_empty());
    }

    #[test]
    fn test_deserialize_messages() {
        let json = r#"[{"id": "a", "subject": "[Acme] X 지원완료"}, {"id": "b", "body": "회사명: B", "date": null}]"#;
        let messages: Vec<InboundMessage> = serde_json::from_str(json).unwrap();
        assert_eq!(parse_messages(&messages).len(), 2);
    }
}
