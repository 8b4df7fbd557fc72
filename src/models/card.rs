use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCard {
    pub card_id: i64,
    #[serde(default)]
    pub card_number: String,
    #[serde(default)]
    pub cardholder_name: String,
    #[serde(default)]
    pub account_id: String,
    pub user_id: i64,
}

impl PaymentCard {
    pub fn masked_number(&self) -> String {
        let number = self.card_number.as_str();
        if number.is_empty() {
            return "****".to_string();
        }
        if number.chars().count() <= 8 {
            return number.to_string();
        }

        let tail: String = number
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("****{tail}")
    }
}
