//! Declarative input validation.
//!
//! A [`Validator`] collects every failure of a request instead of stopping
//! at the first one. Each field runs an ordered chain of rules: pure
//! transforms and checks first, then optionally one store-backed
//! [`FieldRules::lookup`]. The handler proceeds only when
//! [`Validator::finish`] reports a clean slate.

use std::future::Future;
use std::str::FromStr;

use domains::{AppError, FieldError};
use uuid::Uuid;
use validator::ValidateEmail;

#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a rule chain for `name`. Fields are required unless
    /// [`FieldRules::optional`] is called.
    pub fn field(&mut self, name: &'static str, raw: Option<String>) -> FieldRules<'_> {
        FieldRules {
            validator: self,
            name,
            value: raw,
            optional: false,
            redacted: false,
            failed: false,
        }
    }

    /// Records a failure that no per-field rule expresses.
    pub fn reject(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Hands back `value` when no rule failed, otherwise the whole batch.
    pub fn finish<T>(self, value: T) -> Result<T, AppError> {
        if self.errors.is_empty() {
            Ok(value)
        } else {
            Err(AppError::Validation(self.errors))
        }
    }
}

/// Rule chain for a single field.
pub struct FieldRules<'v> {
    validator: &'v mut Validator,
    name: &'static str,
    value: Option<String>,
    optional: bool,
    redacted: bool,
    failed: bool,
}

impl<'v> FieldRules<'v> {
    /// An absent value passes every remaining rule.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Keeps the value out of any error this field reports.
    pub fn redact(mut self) -> Self {
        self.redacted = true;
        self
    }

    pub fn trim(mut self) -> Self {
        self.value = self.value.map(|v| v.trim().to_string());
        self
    }

    pub fn lowercase(mut self) -> Self {
        self.value = self.value.map(|v| v.to_lowercase());
        self
    }

    /// Bounds the value's length in characters, inclusive on both ends.
    pub fn length(mut self, min: usize, max: usize) -> Self {
        let out_of_bounds = self
            .value
            .as_deref()
            .map(|v| v.chars().count())
            .is_some_and(|len| len < min || len > max);
        if out_of_bounds {
            self.fail(format!("must be between {min} and {max} characters"));
        }
        self
    }

    pub fn email(mut self) -> Self {
        if self.value.as_deref().is_some_and(|v| !v.validate_email()) {
            self.fail("must be a valid email address".to_string());
        }
        self
    }

    /// HTML-escapes the value so stored text is safe to render verbatim.
    pub fn escape(mut self) -> Self {
        self.value = self
            .value
            .map(|v| html_escape::encode_safe(&v).into_owned());
        self
    }

    /// The normalized value, or an empty string when the field failed.
    pub fn into_string(self) -> String {
        self.settle().2.unwrap_or_default()
    }

    pub fn into_optional_string(self) -> Option<String> {
        self.settle().2
    }

    pub fn into_integer(self) -> Option<i64> {
        let (validator, field, value) = self.settle();
        let value = value?;
        match value.parse::<i64>() {
            Ok(n) => Some(n),
            Err(_) => {
                validator.push(field, "must be an integer", value);
                None
            }
        }
    }

    /// Parses a UUID-backed identifier. On failure the nil identifier is
    /// returned; it never escapes because [`Validator::finish`] errors.
    pub fn into_id<T: From<Uuid>>(self) -> T {
        T::from(self.into_optional_id::<Uuid>().unwrap_or_else(Uuid::nil))
    }

    pub fn into_optional_id<T: FromStr>(self) -> Option<T> {
        let (validator, field, value) = self.settle();
        let value = value?;
        match value.parse::<T>() {
            Ok(id) => Some(id),
            Err(_) => {
                validator.push(field, "must be a valid identifier", value);
                None
            }
        }
    }

    /// Runs a store-backed step on the normalized value. `Ok(Err(message))`
    /// rejects the value like any other rule; an outer `Err` is a store
    /// failure and aborts validation altogether.
    ///
    /// The step is skipped once any earlier rule of the request has failed,
    /// so a rejected request never writes to the store.
    pub async fn lookup<T, F, Fut>(self, step: F) -> Result<Option<T>, AppError>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<Result<T, String>, AppError>>,
    {
        let (validator, field, value) = self.settle();
        let Some(value) = value.filter(|_| !validator.has_errors()) else {
            return Ok(None);
        };
        match step(value.clone()).await? {
            Ok(resolved) => Ok(Some(resolved)),
            Err(message) => {
                validator.push(field, message, value);
                Ok(None)
            }
        }
    }

    fn fail(&mut self, message: String) {
        self.failed = true;
        let mut error = FieldError::new(self.name, message);
        if !self.redacted {
            error.value = self.value.clone();
        }
        self.validator.errors.push(error);
    }

    fn settle(self) -> (&'v mut Validator, &'static str, Option<String>) {
        let Self {
            validator,
            name,
            value,
            optional,
            failed,
            ..
        } = self;
        match value {
            None if !optional => {
                validator.errors.push(FieldError::new(name, "is required"));
                (validator, name, None)
            }
            _ if failed => (validator, name, None),
            value => (validator, name, value),
        }
    }
}

impl Validator {
    fn push(&mut self, field: &str, message: impl Into<String>, value: String) {
        self.errors
            .push(FieldError::new(field, message).with_value(value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::PostId;

    fn fields(err: AppError) -> Vec<String> {
        match err {
            AppError::Validation(errors) => errors.into_iter().map(|e| e.field).collect(),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn collects_errors_from_every_field() {
        let mut v = Validator::new();
        let title = v.field("title", Some("  a ".into())).trim().length(3, 100).into_string();
        let body = v.field("body", None).trim().length(3, 10).into_string();
        let email = v.field("email", Some("nope".into())).email().into_string();

        assert!(title.is_empty() && body.is_empty() && email.is_empty());
        let err = v.finish(()).unwrap_err();
        assert_eq!(fields(err), vec!["title", "body", "email"]);
    }

    #[test]
    fn trims_and_escapes_before_handing_back() {
        let mut v = Validator::new();
        let title = v
            .field("title", Some("  <b>Hi</b>  ".into()))
            .trim()
            .length(3, 100)
            .escape()
            .into_string();

        let title = v.finish(title).unwrap();
        assert_eq!(title, "&lt;b&gt;Hi&lt;&#x2F;b&gt;");
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        let mut v = Validator::new();
        let value = v.field("title", Some("héé".into())).length(3, 3).into_string();
        assert_eq!(v.finish(value).unwrap(), "héé");
    }

    #[test]
    fn optional_absent_field_skips_rules() {
        let mut v = Validator::new();
        let title = v.field("title", None).optional().trim().length(3, 100).into_optional_string();
        assert_eq!(v.finish(title).unwrap(), None);
    }

    #[test]
    fn optional_present_field_is_still_checked() {
        let mut v = Validator::new();
        let _ = v.field("title", Some("x".into())).optional().length(3, 100).into_optional_string();
        assert_eq!(fields(v.finish(()).unwrap_err()), vec!["title"]);
    }

    #[test]
    fn integers_and_identifiers_are_typed() {
        let mut v = Validator::new();
        let page = v.field("page", Some("2".into())).optional().into_integer();
        let limit = v.field("limit", Some("ten".into())).optional().into_integer();
        let id: PostId = v.field("postid", Some("not-a-uuid".into())).into_id();

        assert_eq!(page, Some(2));
        assert_eq!(limit, None);
        assert_eq!(id, PostId::from_uuid(Uuid::nil()));
        assert_eq!(fields(v.finish(()).unwrap_err()), vec!["limit", "postid"]);
    }

    #[test]
    fn redacted_fields_never_echo_their_value() {
        let mut v = Validator::new();
        v.field("password", Some("hunter2".into()))
            .redact()
            .length(8, 128)
            .into_string();
        match v.finish(()).unwrap_err() {
            AppError::Validation(errors) => assert_eq!(errors[0].value, None),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn email_rule_rejects_markup_and_malformed_addresses() {
        for bad in [
            "<script>alert(1)</script>@x.com",
            "@example.com",
            "ada@@example.com",
            "a da@example.com",
            "nope",
        ] {
            let mut v = Validator::new();
            v.field("email", Some(bad.into())).email().into_string();
            assert_eq!(fields(v.finish(()).unwrap_err()), vec!["email"], "{bad}");
        }

        let mut v = Validator::new();
        let email = v
            .field("email", Some("ada.lovelace@example.com".into()))
            .email()
            .into_string();
        assert_eq!(v.finish(email).unwrap(), "ada.lovelace@example.com");
    }

    #[tokio::test]
    async fn lookup_rejection_is_recorded_with_the_value() {
        let mut v = Validator::new();
        let found: Option<u8> = v
            .field("topic", Some("missing".into()))
            .lookup(|_| async { Ok::<_, AppError>(Err::<u8, _>("does not exist".to_string())) })
            .await
            .unwrap();

        assert_eq!(found, None);
        match v.finish(()).unwrap_err() {
            AppError::Validation(errors) => {
                assert_eq!(errors[0].value.as_deref(), Some("missing"));
                assert_eq!(errors[0].message, "does not exist");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn lookup_is_skipped_when_pure_rules_failed() {
        let mut v = Validator::new();
        let found: Option<u8> = v
            .field("topic", Some(String::new()))
            .length(1, 50)
            .lookup(|_| async {
                Err::<Result<u8, String>, _>(AppError::Internal("store must not be queried".into()))
            })
            .await
            .unwrap();
        assert_eq!(found, None);
        assert!(v.has_errors());
    }

    #[tokio::test]
    async fn lookup_waits_for_a_clean_request() {
        let mut v = Validator::new();
        let _ = v.field("title", Some("x".into())).length(3, 100).into_string();
        let found: Option<u8> = v
            .field("topic", Some("news".into()))
            .lookup(|_| async {
                Err::<Result<u8, String>, _>(AppError::Internal("store must not be queried".into()))
            })
            .await
            .unwrap();
        assert_eq!(found, None);
    }

    #[tokio::test]
    async fn lookup_store_failure_aborts() {
        let mut v = Validator::new();
        let result: Result<Option<u8>, AppError> = v
            .field("topic", Some("news".into()))
            .lookup(|_| async { Err::<Result<u8, String>, _>(AppError::Internal("down".into())) })
            .await;
        assert!(matches!(result, Err(AppError::Internal(_))));
    }
}
