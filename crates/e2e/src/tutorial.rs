//! Built-in scenarios for the tutorial example progression

use crate::scenario::{Scenario, Step};

/// Substring every tutorial page title carries
pub const TITLE_PATTERN: &str = "Tutorial Examples";

/// Placeholder of the input on both refs examples
pub const REFS_PLACEHOLDER: &str = "Type a word";

/// Selector for the refs input, used by focus checks
pub const REFS_INPUT_SELECTOR: &str = "[placeholder='Type a word']";

/// All tutorial scenarios, in tutorial order
pub fn scenarios() -> Vec<Scenario> {
    vec![
        has_title(),
        hello_world(),
        hello_name(),
        counter(),
        refs_problem(),
        refs_solution(),
    ]
}

/// Look a built-in scenario up by name
pub fn find(name: &str) -> Option<Scenario> {
    scenarios().into_iter().find(|s| s.name == name)
}

pub fn has_title() -> Scenario {
    Scenario::new("has_title")
        .with_description("The index page carries the tutorial title")
        .tag("smoke")
        .step(Step::goto("/"))
        .step(Step::expect_title(TITLE_PATTERN))
}

pub fn hello_world() -> Scenario {
    Scenario::on_example("hello_world", "Example 1: Hello, World")
        .with_description("The first example greets the world")
        .tag("smoke")
        .step(Step::expect_contains("h1", "Hello, World!"))
}

pub fn hello_name() -> Scenario {
    Scenario::on_example("hello_name", "Example 2: Hello, Name")
        .with_description("Submitting a name updates the greeting")
        .tag("input")
        .step(Step::click_placeholder("name"))
        .step(Step::fill("name", "Jack"))
        .step(Step::press("name", "Enter"))
        .step(Step::expect_contains("h1", "Hello, Jack!"))
}

/// `+ + - - -` walks the count 0, 1, 2, 1, 0, -1
pub fn counter() -> Scenario {
    [("+", "1"), ("+", "2"), ("-", "1"), ("-", "0"), ("-", "-1")]
        .into_iter()
        .fold(
            Scenario::on_example("counter", "Example 3: Counter")
                .with_description("Increment and decrement buttons update the count")
                .tag("state"),
            |scenario, (button, count)| {
                scenario
                    .step(Step::click_button(button))
                    .step(Step::expect_exact(".count", count))
            },
        )
}

/// Re-rendering the input on every keystroke drops its focus
pub fn refs_problem() -> Scenario {
    Scenario::on_example("refs_problem", "Example 4: Refs Problem")
        .with_description("Typing into an input that is re-rendered loses focus")
        .tag("refs")
        .step(Step::click_placeholder(REFS_PLACEHOLDER))
        .step(Step::expect_focus(REFS_INPUT_SELECTOR, true))
        .step(Step::fill(REFS_PLACEHOLDER, "F"))
        .step(Step::expect_focus(REFS_INPUT_SELECTOR, false))
}

/// Keeping a reference to the input preserves its focus while typing
pub fn refs_solution() -> Scenario {
    Scenario::on_example("refs_solution", "solution")
        .with_description("Typing into an input kept by reference keeps focus")
        .tag("refs")
        .step(Step::click_placeholder(REFS_PLACEHOLDER))
        .step(Step::expect_focus(REFS_INPUT_SELECTOR, true))
        .step(Step::fill(REFS_PLACEHOLDER, "foobar"))
        .step(Step::expect_focus(REFS_INPUT_SELECTOR, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_names_are_unique() {
        let all = scenarios();
        let names: HashSet<_> = all.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names.len(), all.len());
    }

    #[test]
    fn test_every_scenario_starts_at_index() {
        for scenario in scenarios() {
            assert_eq!(scenario.steps[0], Step::goto("/"), "{}", scenario.name);
        }
    }

    #[test]
    fn test_counter_walks_down_to_minus_one() {
        let scenario = counter();
        let mut count = 0i32;
        let mut observed = Vec::new();

        for step in &scenario.steps {
            match step {
                Step::ClickRole { role, name, .. } if role == "button" => {
                    count += if name == "+" { 1 } else { -1 };
                }
                Step::ExpectText { selector, text, exact } => {
                    assert_eq!(selector, ".count");
                    assert!(*exact);
                    assert_eq!(text, &count.to_string());
                    observed.push(count);
                }
                _ => {}
            }
        }

        assert_eq!(observed, [1, 2, 1, 0, -1]);
    }

    #[test]
    fn test_refs_scenarios_differ_only_in_final_focus() {
        let problem = refs_problem();
        let solution = refs_solution();

        assert_eq!(
            problem.steps.last(),
            Some(&Step::expect_focus(REFS_INPUT_SELECTOR, false))
        );
        assert_eq!(
            solution.steps.last(),
            Some(&Step::expect_focus(REFS_INPUT_SELECTOR, true))
        );
        assert!(solution.steps.contains(&Step::fill(REFS_PLACEHOLDER, "foobar")));
    }

    #[test]
    fn test_find() {
        assert_eq!(find("hello_name").map(|s| s.steps.len()), Some(6));
        assert!(find("missing").is_none());
    }
}
