//! Listing page extraction and validation throughput
//!
//! A 20-card page in the books.toscrape layout, parsed with the default
//! selectors and validated with the default rules.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use catalog_harvester::domain::{ValidatedProduct, ValidationRules};
use catalog_harvester::infrastructure::{ProductListExtractor, RenderedPage, SelectorConfig};

const RATINGS: [&str; 5] = ["One", "Two", "Three", "Four", "Five"];

fn listing_page(cards: usize) -> RenderedPage {
    let mut html = String::from("<html><body><ol class=\"row\">");
    for i in 0..cards {
        html.push_str(&format!(
            "<li><article class=\"product_pod\">\
               <h3><a href=\"book_{i}/index.html\" title=\"Book number {i}\">Book number {i}</a></h3>\
               <p class=\"star-rating {rating}\"></p>\
               <div class=\"product_price\">\
                 <p class=\"price_color\">£{pounds}.{pence:02}</p>\
                 <p class=\"instock availability\">In stock</p>\
               </div>\
             </article></li>",
            rating = RATINGS[i % RATINGS.len()],
            pounds = 10 + i,
            pence = (i * 7) % 100,
        ));
    }
    html.push_str("</ol><ul class=\"pager\"><li class=\"next\"><a href=\"page-2.html\">next</a></li></ul></body></html>");
    RenderedPage::new("https://books.test/catalogue/page-1.html", html, 200)
}

fn extraction(c: &mut Criterion) {
    let extractor = ProductListExtractor::new(&SelectorConfig::default()).unwrap();
    let rules = ValidationRules::default();
    let page = listing_page(20);

    c.bench_function("extract listing page (20 cards)", |b| {
        b.iter(|| black_box(extractor.extract(black_box(&page))));
    });

    c.bench_function("extract and validate listing page (20 cards)", |b| {
        b.iter(|| {
            let extraction = extractor.extract(black_box(&page));
            let valid = extraction
                .products
                .iter()
                .filter_map(|raw| ValidatedProduct::from_raw(raw, &rules).ok())
                .count();
            black_box(valid)
        });
    });
}

criterion_group!(benches, extraction);
criterion_main!(benches);
