/// Recommendation templates for biomarker insights.
/// Calm, informational wording. Out-of-range results point to a provider,
/// never to a diagnosis.
pub struct RecommendationTemplates;

impl RecommendationTemplates {
    pub fn within_range(test_name: &str) -> String {
        format!(
            "Your {} result is within the reference range. No action is indicated by this value alone.",
            test_name,
        )
    }

    pub fn below_range(test_name: &str, low: &str, high: &str) -> String {
        format!(
            "Your {} result is below the reference range ({}-{}). \
             Consider consulting your healthcare provider about this result.",
            test_name, low, high,
        )
    }

    pub fn above_range(test_name: &str, low: &str, high: &str) -> String {
        format!(
            "Your {} result is above the reference range ({}-{}). \
             Consider consulting your healthcare provider about this result.",
            test_name, low, high,
        )
    }

    pub fn positive_finding(test_name: &str, value: &str) -> String {
        format!(
            "Your {} result was reported as {}. \
             Please consult your healthcare provider to discuss what this means for you.",
            test_name, value,
        )
    }

    pub fn negative_finding(test_name: &str, value: &str) -> String {
        format!(
            "Your {} result was reported as {}, which is the expected finding.",
            test_name, value,
        )
    }

    pub fn needs_review(test_name: &str) -> String {
        format!(
            "Your {} result could not be interpreted automatically. \
             Please ask a healthcare provider to review it manually.",
            test_name,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_templates_mention_provider() {
        assert!(RecommendationTemplates::below_range("Iron", "60", "170").contains("provider"));
        assert!(RecommendationTemplates::above_range("Iron", "60", "170").contains("provider"));
        assert!(RecommendationTemplates::positive_finding("HIV", "Positive").contains("provider"));
        assert!(RecommendationTemplates::needs_review("Culture").contains("manually"));
    }

    #[test]
    fn templates_include_range() {
        let msg = RecommendationTemplates::above_range("Glucose", "70", "100");
        assert!(msg.contains("Glucose"));
        assert!(msg.contains("(70-100)"));
    }

    #[test]
    fn no_alarm_wording() {
        let all = [
            RecommendationTemplates::within_range("X"),
            RecommendationTemplates::below_range("X", "1", "2"),
            RecommendationTemplates::above_range("X", "1", "2"),
            RecommendationTemplates::positive_finding("X", "Detected"),
            RecommendationTemplates::negative_finding("X", "Absent"),
            RecommendationTemplates::needs_review("X"),
        ];
        for msg in all {
            let lower = msg.to_lowercase();
            assert!(!lower.contains("urgent"), "{msg}");
            assert!(!lower.contains("danger"), "{msg}");
            assert!(!lower.contains("diagnos"), "{msg}");
        }
    }
}
