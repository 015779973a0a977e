// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::extractor_for;
use super::helpers::fake_browser::*;
use staycrawl::crawler::{DetailContext, DetailNavigator};
use staycrawl::domain::models::listing::{ListingSummary, NOT_FOUND};
use staycrawl::engines::traits::{BrowserSession, ContextId};
use staycrawl::extractors::selector_catalog::Field;
use std::sync::Arc;
use std::time::Duration;

fn summary(id: u32) -> ListingSummary {
    ListingSummary {
        title: format!("Logement {}", id),
        host: format!("Hôte {}", id),
        price_label: "95 €".to_string(),
        detail_url: detail_url(id),
        ..Default::default()
    }
}

fn navigator(browser: &Arc<FakeBrowser>) -> DetailNavigator {
    DetailNavigator::new(
        browser.clone(),
        extractor_for(browser.clone()),
        Duration::from_secs(5),
    )
}

#[tokio::test(start_paused = true)]
async fn test_fetch_fills_detail_and_restores_context() {
    let browser = Arc::new(FakeBrowser::new(vec![listing_page(&[1], false)]).with_details(&[1]));
    browser.navigate(START_URL).await.unwrap();

    let detail = navigator(&browser).fetch(&summary(1), 3).await;

    assert_eq!(detail.title(), "Logement 1");
    assert_eq!(detail.summary.host, "Hôte 1");
    assert_eq!(detail.page_number, 3);
    assert_eq!(detail.description, "Description du logement 1");
    assert_eq!(detail.summary.location, "Paris, Île-de-France");
    assert_eq!(detail.photos.len(), 2);
    assert_eq!(detail.comments.len(), 2);
    assert_eq!(detail.rating, "Note de 4,92 sur 5");

    assert_eq!(browser.open_context_count(), 1);
    assert_eq!(browser.max_open_contexts(), 2);
    assert_eq!(browser.active(), Some(ContextId(1)));
    assert_eq!(browser.current_url().await.unwrap(), START_URL);
}

#[tokio::test(start_paused = true)]
async fn test_fetch_without_url_opens_no_context() {
    let browser = Arc::new(FakeBrowser::new(vec![]));
    let card = ListingSummary {
        title: "Sans lien".to_string(),
        ..Default::default()
    };

    let detail = navigator(&browser).fetch(&card, 1).await;

    assert_eq!(detail.title(), "Sans lien");
    assert_eq!(detail.description, NOT_FOUND);
    assert_eq!(detail.rating, NOT_FOUND);
    assert!(detail.photos.is_empty());
    assert_eq!(browser.max_open_contexts(), 1);
    assert!(browser.navigations().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_navigation_failure_yields_sentinel_record() {
    let browser = Arc::new(FakeBrowser::new(vec![]));
    browser.fail_navigation(&detail_url(4));

    let detail = navigator(&browser).fetch(&summary(4), 1).await;

    assert_eq!(detail.description, NOT_FOUND);
    assert_eq!(detail.summary.host, "Hôte 4");
    assert_eq!(browser.open_context_count(), 1);
    assert_eq!(browser.active(), Some(ContextId(1)));
}

#[tokio::test(start_paused = true)]
async fn test_hanging_navigation_times_out() {
    let browser = Arc::new(FakeBrowser::new(vec![]));
    browser.hang_navigation(&detail_url(5));

    let detail = navigator(&browser).fetch(&summary(5), 1).await;

    assert_eq!(detail.description, NOT_FOUND);
    assert_eq!(detail.rating, NOT_FOUND);
    assert_eq!(browser.open_context_count(), 1);
    assert_eq!(browser.active(), Some(ContextId(1)));
}

#[tokio::test(start_paused = true)]
async fn test_no_context_leak_when_any_detail_field_fails() {
    let fields = [
        Field::TranslationClose,
        Field::Description,
        Field::Location,
        Field::ShowAllPhotos,
        Field::GalleryImage,
        Field::GalleryClose,
        Field::Comment,
        Field::RatingContainer,
        Field::RatingValue,
    ];

    for field in fields {
        let browser = Arc::new(FakeBrowser::new(vec![]).with_details(&[1]));
        browser.fail_selector(field);

        let detail = navigator(&browser).fetch(&summary(1), 1).await;

        assert_eq!(detail.title(), "Logement 1", "{:?}", field);
        assert_eq!(browser.open_context_count(), 1, "leaked context for {:?}", field);
        assert_eq!(browser.active(), Some(ContextId(1)), "{:?}", field);
    }
}

#[tokio::test(start_paused = true)]
async fn test_no_context_leak_when_extraction_panics() {
    for field in [Field::Description, Field::GalleryImage, Field::RatingValue] {
        let browser = Arc::new(FakeBrowser::new(vec![]).with_details(&[1]));
        browser.panic_on_selector(field);

        let detail = navigator(&browser).fetch(&summary(1), 1).await;

        assert_eq!(detail.title(), "Logement 1");
        assert_eq!(browser.open_context_count(), 1, "leaked context for {:?}", field);
        assert_eq!(browser.active(), Some(ContextId(1)));
    }
}

#[tokio::test(start_paused = true)]
async fn test_detail_context_release() {
    let browser = Arc::new(FakeBrowser::new(vec![]));

    let scope = DetailContext::acquire(browser.as_ref()).await.unwrap();
    assert_eq!(scope.origin(), ContextId(1));
    assert_eq!(browser.active(), Some(scope.context()));
    assert_eq!(browser.open_context_count(), 2);

    scope.release().await;
    assert_eq!(browser.open_context_count(), 1);
    assert_eq!(browser.active(), Some(ContextId(1)));
}
