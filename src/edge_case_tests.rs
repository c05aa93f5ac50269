//! Edge case tests
//!
//! Boundary inputs for the tokenizer, compiler, parts and processors that
//! are easy to get subtly wrong.

#[cfg(test)]
mod tests {
    use crate::test_utils::{instance_html, render};
    use crate::tokenizer::{tokenize, Token};
    use crate::*;
    use pretty_assertions::assert_eq;

    fn lit(s: &str) -> Token {
        Token::Literal(s.to_string())
    }

    fn slot(s: &str) -> Token {
        Token::Slot(s.to_string())
    }

    #[test]
    fn test_empty_template() {
        let (doc, instance) = render("", &State::new()).unwrap();
        assert!(instance.parts().is_empty());
        assert_eq!(instance_html(&doc, &instance), "");
    }

    #[test]
    fn test_template_with_only_text() {
        let (doc, instance) = render("just text", &State::new()).unwrap();
        assert_eq!(instance_html(&doc, &instance), "just text");
    }

    #[test]
    fn test_unterminated_marker_is_literal() {
        assert_eq!(&*tokenize("a {{b"), &[lit("a "), lit("{{b")]);
        assert_eq!(&*tokenize("{{"), &[lit("{{")]);
    }

    #[test]
    fn test_escaped_markers_are_literal() {
        assert_eq!(&*tokenize(r"\{{a}}"), &[lit(r"\{{a}}")]);
    }

    #[test]
    fn test_nested_markers_balance() {
        assert_eq!(&*tokenize("{{ {{a}} }}x"), &[slot("{{a}}"), lit("x")]);
    }

    #[test]
    fn test_adjacent_slots() {
        assert_eq!(&*tokenize("{{a}}{{b}}"), &[slot("a"), slot("b")]);
        let (doc, instance) = render("<p>{{a}}{{b}}</p>", &State::new().with("a", 1).with("b", 2)).unwrap();
        assert_eq!(instance_html(&doc, &instance), "<p>12</p>");
    }

    #[test]
    fn test_same_key_twice() {
        let (doc, instance) = render("<p title=\"{{x}}\">{{x}}</p>", &State::new().with("x", "same")).unwrap();
        assert_eq!(instance.parts().len(), 2);
        assert_eq!(instance_html(&doc, &instance), "<p title=\"same\">same</p>");
    }

    #[test]
    fn test_unicode_text_values() {
        let (mut doc, mut instance) = render("<p>{{x}}</p>", &State::new().with("x", "héllo wörld")).unwrap();
        instance.update(&mut doc, &State::new().with("x", "日本語")).unwrap();
        assert_eq!(instance_html(&doc, &instance), "<p>日本語</p>");
    }

    #[test]
    fn test_html_in_values_is_text() {
        let (doc, instance) = render("<p>{{x}}</p>", &State::new().with("x", "<script>x</script>")).unwrap();
        assert_eq!(
            instance_html(&doc, &instance),
            "<p>&lt;script&gt;x&lt;/script&gt;</p>"
        );
    }

    #[test]
    fn test_missing_keys_leave_placeholders() {
        let (doc, instance) = render("<p class=\"a {{b}}\">{{c}}</p>", &State::new()).unwrap();
        assert_eq!(instance_html(&doc, &instance), "<p class=\"a \"></p>");
        let part = instance.part("c").and_then(Part::as_child_node).unwrap();
        assert_eq!(part.nodes().len(), 1);
    }

    #[test]
    fn test_number_formatting() {
        let (doc, instance) = render(
            "{{a}} {{b}} {{c}}",
            &State::new().with("a", 3.0).with("b", -0.5).with("c", 1_000_000u64),
        )
        .unwrap();
        assert_eq!(instance_html(&doc, &instance), "3 -0.5 1000000");
    }

    #[test]
    fn test_toggling_between_text_and_nodes() {
        let (mut doc, mut instance) = render("<div>{{x}}</div>", &State::new().with("x", "text")).unwrap();
        let fragment = doc.parse_html("<i>a</i><i>b</i>").unwrap();
        instance.update(&mut doc, &State::new().with("x", fragment)).unwrap();
        assert_eq!(instance_html(&doc, &instance), "<div><i>a</i><i>b</i></div>");

        instance.update(&mut doc, &State::new().with("x", "text")).unwrap();
        assert_eq!(instance_html(&doc, &instance), "<div>text</div>");
        let part = instance.part("x").and_then(Part::as_child_node).unwrap();
        assert_eq!(part.nodes().len(), 1);
    }

    #[test]
    fn test_listener_as_content_is_an_error() {
        let (mut doc, mut instance) = render("<p>{{x}}</p>", &State::new()).unwrap();
        let outcome = instance.update(&mut doc, &State::new().with("x", Value::listener(|_| {})));
        assert!(matches!(outcome, Err(Error::RenderError(_))));
    }

    #[test]
    fn test_deeply_nested_parts() {
        let mut markup = String::from("{{x}}");
        for _ in 0..30 {
            markup = format!("<div>{}</div>", markup);
        }
        let (doc, instance) = render(&markup, &State::new().with("x", "deep")).unwrap();
        assert!(instance_html(&doc, &instance).contains(">deep<"));
    }

    #[test]
    fn test_boolean_on_not_fully_templatized_attribute() {
        let (mut doc, instance) = render("<input hidden=\"x{{h}}\">", &State::new()).unwrap();
        let part = instance.part("h").and_then(Part::as_attribute).unwrap();
        assert!(!part.is_sole_fragment());
        assert!(matches!(
            part.set_boolean_value(&mut doc, true),
            Err(Error::InvariantViolation(_))
        ));
    }
}
