use std::sync::Arc;

use dom_parts::cache::{get_global_cache, CacheKey, TemplateCache};
use dom_parts::*;

#[test]
fn test_markup_templates_are_cached_by_content() {
    let markup = "<section data-test=\"caching\">{{x}}</section>";
    let config = TemplateConfig::new().with_cache_mode(CacheMode::Normal);

    let first = Template::parse_with_config(markup, &config).unwrap();
    let second = Template::parse_with_config(markup, &config).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert!(get_global_cache().contains(&CacheKey::Markup(markup.to_string())));

    let uncached = TemplateConfig::new().with_cache_mode(CacheMode::None);
    let third = Template::parse_with_config(markup, &uncached).unwrap();
    assert!(!Arc::ptr_eq(&first, &third));
    assert_eq!(first.to_html(), third.to_html());
}

#[test]
fn test_tagged_templates_are_cached_by_call_site() {
    let config = TemplateConfig::default();
    let make = |v: i32| html!(["<em data-site=\"one\">", "</em>"], v);
    let a = make(1).template(&config).unwrap();
    let b = make(2).template(&config).unwrap();
    assert!(Arc::ptr_eq(&a, &b));

    // identical text at another call site is a different template
    let other = html!(["<em data-site=\"one\">", "</em>"], 1);
    let c = other.template(&config).unwrap();
    assert!(!Arc::ptr_eq(&a, &c));
}

#[test]
fn test_private_cache_statistics() {
    let cache = TemplateCache::new();
    let key = CacheKey::Markup("<p>{{a}}</p>".to_string());
    for _ in 0..3 {
        cache
            .get_or_compile(&key, || Template::parse("<p>{{a}}</p>"))
            .unwrap();
    }
    let stats = cache.stats();
    assert_eq!(stats.entry_count, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 2);

    cache.clear();
    assert_eq!(cache.stats().entry_count, 0);
}
