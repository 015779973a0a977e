// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::extractor_for;
use super::helpers::fake_browser::*;
use staycrawl::domain::models::listing::NOT_FOUND;
use staycrawl::engines::traits::BrowserSession;
use staycrawl::extractors::selector_catalog::Field;
use std::sync::Arc;

async fn on_detail(doc: FakeDoc) -> Arc<FakeBrowser> {
    let url = detail_url(1);
    let browser = Arc::new(FakeBrowser::new(vec![]).with_detail(&url, doc));
    browser.navigate(&url).await.unwrap();
    browser
}

#[tokio::test(start_paused = true)]
async fn test_full_detail_page() {
    let browser = on_detail(detail_page(1)).await;
    let extractor = extractor_for(browser.clone());

    assert_eq!(extractor.description().await, "Description du logement 1");
    assert_eq!(extractor.location().await, "Paris, Île-de-France");
    assert_eq!(
        extractor.photos().await,
        vec!["https://img/1/1.jpg".to_string(), "https://img/1/2.jpg".to_string()]
    );
    assert_eq!(extractor.comments().await, vec!["Super séjour", "Très propre"]);
    assert_eq!(extractor.rating().await, "Note de 4,92 sur 5");
}

#[tokio::test(start_paused = true)]
async fn test_empty_detail_page_yields_sentinels() {
    let browser = on_detail(FakeDoc::default()).await;
    let extractor = extractor_for(browser.clone());

    assert_eq!(extractor.description().await, NOT_FOUND);
    assert_eq!(extractor.location().await, NOT_FOUND);
    assert!(extractor.photos().await.is_empty());
    assert!(extractor.comments().await.is_empty());
    assert_eq!(extractor.rating().await, NOT_FOUND);
}

#[tokio::test(start_paused = true)]
async fn test_translation_overlay_is_dismissed() {
    let doc = FakeDoc::new(vec![
        FakeNode::new(Field::TranslationClose),
        FakeNode::new(Field::Description).text("Appartement calme"),
    ]);
    let browser = on_detail(doc).await;

    let description = extractor_for(browser.clone()).description().await;

    assert_eq!(description, "Appartement calme");
    assert_eq!(browser.click_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_location_falls_back_to_later_candidates() {
    let doc = FakeDoc::new(vec![FakeNode::with_selector(
        r#"div[data-section-id="OVERVIEW_DEFAULT"] h2"#,
    )
    .text("Logement entier : loft à Paris")]);
    let browser = on_detail(doc).await;

    assert_eq!(
        extractor_for(browser.clone()).location().await,
        "Logement entier : loft à Paris"
    );
}

#[tokio::test(start_paused = true)]
async fn test_rating_falls_back_to_text() {
    let doc = FakeDoc::new(vec![FakeNode::new(Field::RatingContainer)
        .child(FakeNode::with_selector("[aria-label]").text("4,85"))]);
    let browser = on_detail(doc).await;

    assert_eq!(extractor_for(browser.clone()).rating().await, "4,85");
}

#[tokio::test(start_paused = true)]
async fn test_failing_selector_degrades_single_field() {
    let browser = on_detail(detail_page(1)).await;
    browser.fail_selector(Field::Description);
    let extractor = extractor_for(browser.clone());

    assert_eq!(extractor.description().await, NOT_FOUND);
    assert_eq!(extractor.rating().await, "Note de 4,92 sur 5");
}
