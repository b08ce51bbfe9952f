//! HTML form discovery and field matching.
//!
//! Pages are scanned with regexes rather than a DOM; petition landing pages
//! are small and flat enough that `<form>`/`<input>` extraction is reliable.

use std::sync::LazyLock;

use regex::Regex;

use crate::petitions::LogicalField;
use crate::pipeline::field_mapper::FieldMapping;

static FORM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<form\b([^>]*)>(.*?)</form\s*>").expect("valid form regex")
});

static CONTROL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(input|textarea|select|button)\b([^>]*)>").expect("valid control regex")
});

static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)([a-z_:][-a-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#)
        .expect("valid attribute regex")
});

/// Name/id patterns recognised for each logical field.
static SYNONYMS: LazyLock<Vec<(LogicalField, Regex)>> = LazyLock::new(|| {
    let table: [(LogicalField, &str); 8] = [
        (
            LogicalField::FirstName,
            r"first[_\s-]?name|fname|given[_\s-]?name",
        ),
        (
            LogicalField::LastName,
            r"last[_\s-]?name|lname|surname|family[_\s-]?name",
        ),
        (LogicalField::Email, r"e[-_\s]?mail"),
        (LogicalField::ZipCode, r"zip|postal[_\s-]?code|postcode"),
        (LogicalField::Phone, r"phone|tel|mobile|cell"),
        (LogicalField::Address, r"address|street|addr"),
        (LogicalField::City, r"city|town"),
        (LogicalField::State, r"state|region|province"),
    ];
    table
        .into_iter()
        .map(|(field, pattern)| {
            let re = Regex::new(&format!("(?i){pattern}")).expect("valid synonym regex");
            (field, re)
        })
        .collect()
});

/// HTTP method a form submits with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMethod {
    Get,
    Post,
}

/// One form control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormControl {
    /// `input`, `textarea`, `select`, or `button`.
    pub tag: String,
    pub name: Option<String>,
    pub id: Option<String>,
    pub placeholder: Option<String>,
    /// Lower-cased `type` attribute; `text` for inputs without one.
    pub kind: String,
    pub value: Option<String>,
}

impl FormControl {
    fn is_hidden(&self) -> bool {
        self.tag == "input" && self.kind == "hidden"
    }

    fn is_submit(&self) -> bool {
        match self.tag.as_str() {
            "button" => self.kind == "submit",
            "input" => matches!(self.kind.as_str(), "submit" | "image"),
            _ => false,
        }
    }

    /// Controls that take typed text.
    fn is_fillable(&self) -> bool {
        match self.tag.as_str() {
            "textarea" => true,
            "input" => matches!(
                self.kind.as_str(),
                "text" | "email" | "tel" | "number" | "search" | "url"
            ),
            _ => false,
        }
    }
}

/// A parsed `<form>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlForm {
    /// Raw `action` attribute; `None` submits to the page itself.
    pub action: Option<String>,
    pub method: FormMethod,
    pub controls: Vec<FormControl>,
}

/// The key/value pairs a form would submit after filling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub pairs: Vec<(String, String)>,
    /// How many mapping entries landed in a control.
    pub filled: usize,
}

/// Every `<form>` on the page, in document order.
pub fn parse_forms(html: &str) -> Vec<HtmlForm> {
    FORM_RE
        .captures_iter(html)
        .map(|caps| {
            let attrs = &caps[1];
            let method = match attr(attrs, "method").as_deref().map(str::to_ascii_lowercase) {
                Some(m) if m == "post" => FormMethod::Post,
                _ => FormMethod::Get,
            };
            HtmlForm {
                action: attr(attrs, "action").filter(|a| !a.trim().is_empty()),
                method,
                controls: parse_controls(&caps[2]),
            }
        })
        .collect()
}

fn parse_controls(inner: &str) -> Vec<FormControl> {
    CONTROL_RE
        .captures_iter(inner)
        .map(|caps| {
            let tag = caps[1].to_ascii_lowercase();
            let attrs = &caps[2];
            let default_kind = match tag.as_str() {
                "button" => "submit",
                "input" => "text",
                other => other,
            };
            FormControl {
                kind: attr(attrs, "type")
                    .map(|t| t.to_ascii_lowercase())
                    .unwrap_or_else(|| default_kind.to_string()),
                name: attr(attrs, "name").filter(|n| !n.is_empty()),
                id: attr(attrs, "id").filter(|n| !n.is_empty()),
                placeholder: attr(attrs, "placeholder"),
                value: attr(attrs, "value"),
                tag,
            }
        })
        .collect()
}

/// Value of attribute `name` within a tag's attribute text.
fn attr(attrs: &str, name: &str) -> Option<String> {
    ATTR_RE.captures_iter(attrs).find_map(|caps| {
        if !caps[1].eq_ignore_ascii_case(name) {
            return None;
        }
        caps.get(2)
            .or_else(|| caps.get(3))
            .or_else(|| caps.get(4))
            .map(|m| m.as_str().to_string())
    })
}

/// Lower-cased name and id of a control.
fn identifiers(control: &FormControl) -> [String; 2] {
    [
        control.name.as_deref().unwrap_or_default().to_lowercase(),
        control.id.as_deref().unwrap_or_default().to_lowercase(),
    ]
}

/// Pick the control a mapping key should fill, if any.
///
/// Tried in order: exact name or id, partial name or id, placeholder text,
/// then the synonym patterns when the key is a logical field name.
fn match_control<'a>(
    key: &str,
    candidates: &[&'a FormControl],
    taken: &[&str],
) -> Option<&'a FormControl> {
    let key_lc = key.to_lowercase();
    let free: Vec<&'a FormControl> = candidates
        .iter()
        .copied()
        .filter(|c| c.name.as_deref().is_some_and(|n| !taken.contains(&n)))
        .collect();

    let exact = free
        .iter()
        .copied()
        .find(|&c| identifiers(c).iter().any(|s| *s == key_lc));
    if exact.is_some() {
        return exact;
    }

    let partial = free.iter().copied().find(|&c| {
        identifiers(c)
            .iter()
            .any(|s| !s.is_empty() && s.contains(&key_lc))
    });
    if partial.is_some() {
        return partial;
    }

    let spaced = key_lc.replace('_', " ");
    let by_placeholder = free.iter().copied().find(|&c| {
        c.placeholder
            .as_deref()
            .is_some_and(|p| p.to_lowercase().contains(&spaced))
    });
    if by_placeholder.is_some() {
        return by_placeholder;
    }

    let field: LogicalField = key.parse().ok()?;
    let (_, pattern) = SYNONYMS.iter().find(|(f, _)| *f == field)?;
    free.into_iter().find(|&c| {
        identifiers(c)
            .iter()
            .any(|s| !s.is_empty() && pattern.is_match(s))
    })
}

/// Fill `form` from `fields`.
///
/// Hidden inputs keep their values, the first named submit control is
/// included the way a browser click would, and every other control is left
/// out unless a mapping entry matched it.
pub fn fill_form(form: &HtmlForm, fields: &FieldMapping) -> Submission {
    let candidates: Vec<&FormControl> = form.controls.iter().filter(|c| c.is_fillable()).collect();
    let mut pairs = Vec::new();
    let mut taken: Vec<&str> = Vec::new();
    let mut filled = 0;

    for control in form.controls.iter().filter(|c| c.is_hidden()) {
        if let Some(name) = &control.name {
            pairs.push((name.clone(), control.value.clone().unwrap_or_default()));
        }
    }

    for (key, value) in fields {
        if let Some(control) = match_control(key, &candidates, &taken) {
            if let Some(name) = control.name.as_deref() {
                taken.push(name);
                pairs.push((name.to_string(), value.clone()));
                filled += 1;
            }
        }
    }

    if let Some(submit) = form.controls.iter().find(|c| c.is_submit()) {
        if let Some(name) = &submit.name {
            pairs.push((name.clone(), submit.value.clone().unwrap_or_default()));
        }
    }

    Submission { pairs, filled }
}

/// Whether the form has a submit control.
pub fn has_submit(form: &HtmlForm) -> bool {
    form.controls.iter().any(FormControl::is_submit)
}

/// The first form on the page that at least one mapping entry fills.
pub fn choose_form<'a>(forms: &'a [HtmlForm], fields: &FieldMapping) -> Option<(&'a HtmlForm, Submission)> {
    forms.iter().find_map(|form| {
        let submission = fill_form(form, fields);
        (submission.filled > 0).then_some((form, submission))
    })
}
