use std::fmt::Display;

use ruse_shared::http::HttpResponse;

/// What a completed stage must look like: the marker header's value and the
/// exact body text of the final response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expectation {
    pub header_value: String,
    pub body: String,
}

impl Expectation {
    pub fn new(header_value: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            header_value: header_value.into(),
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Header,
    Body,
}

impl Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Field::Header => write!(f, "header"),
            Field::Body => write!(f, "body"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub field: Field,
    pub expected: String,
    pub actual: String,
}

impl Display for Mismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} expected {:?} got {:?}",
            self.field, self.expected, self.actual
        )
    }
}

#[derive(Debug, Clone)]
pub struct Verifier {
    header: String,
}

impl Verifier {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
        }
    }

    /// Both fields are always evaluated; a response that misses on both
    /// reports both mismatches together.
    pub fn verify(
        &self,
        response: &HttpResponse,
        expect: &Expectation,
    ) -> Result<(), Vec<Mismatch>> {
        let mut mismatches = Vec::new();

        let actual_header = response.header_str(&self.header).unwrap_or_default();
        if actual_header != expect.header_value {
            mismatches.push(Mismatch {
                field: Field::Header,
                expected: expect.header_value.clone(),
                actual: actual_header.to_string(),
            });
        }

        let actual_body = response.body_str();
        if actual_body != expect.body {
            mismatches.push(Mismatch {
                field: Field::Body,
                expected: expect.body.clone(),
                actual: actual_body.into_owned(),
            });
        }

        if mismatches.is_empty() {
            Ok(())
        } else {
            Err(mismatches)
        }
    }
}
