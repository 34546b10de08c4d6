use crate::outlets::OutletRecord;
use crate::scrape::html::{find_all, find_first, Element};

/// Outlet records from a store-category page, one per `elementor-post`
/// article that names both an outlet and an address.
pub fn parse_outlets(page: &str) -> Vec<OutletRecord> {
    find_all(page, "article", Some("elementor-post"))
        .into_iter()
        .filter_map(|article| {
            let name = outlet_name(&article)?;
            let address = outlet_address(&article)?;
            Some(OutletRecord::from_listing(name, address))
        })
        .collect()
}

fn outlet_name(article: &Element<'_>) -> Option<String> {
    find_first(article.inner, "h3", Some("elementor-post__title"))
        .and_then(|title| find_first(title.inner, "a", None))
        .map(|link| link.text())
        .filter(|name| !name.is_empty())
        .or_else(|| {
            find_first(article.inner, "p", Some("elementor-heading-title"))
                .map(|heading| heading.text())
                .filter(|name| !name.is_empty())
        })
}

fn outlet_address(article: &Element<'_>) -> Option<String> {
    let content = find_first(article.inner, "div", Some("elementor-widget-theme-post-content"))?;
    let paragraph = find_first(content.inner, "p", None)?.text();
    let address = paragraph
        .strip_prefix("Address:")
        .unwrap_or(&paragraph)
        .trim()
        .to_string();
    Some(address).filter(|address| !address.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outlets::{OutletStatus, DEFAULT_OPERATING_HOURS};

    const STORE_PAGE: &str = r#"
<div class="elementor-posts-container">
  <article class="elementor-post elementor-grid-item post-1 type-post">
    <div class="elementor-post__text">
      <h3 class="elementor-post__title"><a href="/zus-coffee-bangsar/">ZUS Coffee &#8211; Bangsar</a></h3>
    </div>
    <div class="elementor-element elementor-widget elementor-widget-theme-post-content">
      <div class="elementor-widget-container">
        <p>Address: No 12, Jalan Telawi 3,
           Bangsar Baru, 59100 Kuala Lumpur</p>
        <p>Opening soon</p>
      </div>
    </div>
  </article>
  <article class="elementor-post elementor-grid-item post-2">
    <p class="elementor-heading-title elementor-size-default">ZUS Coffee SS15 Subang</p>
    <div class="elementor-widget elementor-widget-theme-post-content">
      <p>Lot 5, Jalan SS 15/4, 47500 Subang Jaya, Selangor</p>
    </div>
  </article>
  <article class="elementor-post post-3">
    <h3 class="elementor-post__title"><a href="/zus-coffee-pj/">ZUS Coffee Section 17</a></h3>
    <div class="elementor-widget-theme-post-content"><p>No 3, Jalan 17/45, 46400 Petaling Jaya</p></div>
  </article>
  <article class="elementor-post post-4">
    <h3 class="elementor-post__title"><a href="/no-address/">ZUS Coffee Nowhere</a></h3>
  </article>
</div>"#;

    #[test]
    fn test_parse_outlets() {
        let outlets = parse_outlets(STORE_PAGE);
        assert_eq!(outlets.len(), 3);

        assert_eq!(outlets[0].name, "ZUS Coffee – Bangsar");
        assert_eq!(
            outlets[0].address,
            "No 12, Jalan Telawi 3, Bangsar Baru, 59100 Kuala Lumpur"
        );
        assert_eq!(outlets[0].state, "Kuala Lumpur");
        assert_eq!(outlets[0].status, OutletStatus::Open);
        assert_eq!(outlets[0].operating_hours, DEFAULT_OPERATING_HOURS);

        assert_eq!(outlets[1].name, "ZUS Coffee SS15 Subang");
        assert_eq!(outlets[1].state, "Selangor");

        // no state named in the address
        assert_eq!(outlets[2].state, "N/A");
    }

    #[test]
    fn test_page_without_articles() {
        assert!(parse_outlets("<main><p>No stores</p></main>").is_empty());
    }
}
