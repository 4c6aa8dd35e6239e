use super::plan::parse_json_value;
use serde_json::Value;

/// The assembled reply, returned as JSON when it parses as JSON
#[derive(Debug, Clone, PartialEq)]
pub enum FinalAnswer {
    Json(Value),
    Text(String),
}

impl FinalAnswer {
    pub fn from_reply(reply: &str) -> Self {
        match parse_json_value(reply) {
            Some(value) => FinalAnswer::Json(value),
            None => FinalAnswer::Text(reply.to_string()),
        }
    }

    pub fn is_json(&self) -> bool {
        matches!(self, FinalAnswer::Json(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_reply() {
        assert_eq!(
            FinalAnswer::from_reply("[1, \"Titanic\", 0.48]"),
            FinalAnswer::Json(json!([1, "Titanic", 0.48]))
        );
    }

    #[test]
    fn test_text_reply() {
        let answer = FinalAnswer::from_reply("Roughly 42 films.");
        assert_eq!(answer, FinalAnswer::Text("Roughly 42 films.".to_string()));
        assert!(!answer.is_json());
    }
}
