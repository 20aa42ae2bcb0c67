//! Built-in site profiles.

use super::html::SiteProfile;

/// Biquge-style mirrors: `#content` body, `#list` catalog.
pub const BIQU: SiteProfile = SiteProfile {
    name: "biqu",
    default_origin: "https://www.biquge.com/",
    content: "#content",
    title: ".bookname h1",
    navigation: ".bottem1 a, .bottem2 a, .bookname .bottem1 a",
    catalog: "#list dd a",
    next_labels: &["下一章", "下一页"],
    prev_labels: &["上一章", "上一页"],
    boilerplate: &[
        r"请记住本书首发域名",
        r"笔趣阁手机版",
        r"(?i)biquge",
    ],
};

/// Caimo-style sites: `#content` body inside `.read-content`, `#readerlist` catalog.
pub const CAIMO: SiteProfile = SiteProfile {
    name: "caimo",
    default_origin: "https://www.caimoge.net/",
    content: ".read-content #content, #content",
    title: "h1",
    navigation: ".read-page a, .page a",
    catalog: "#readerlist li a",
    next_labels: &["下一章", "下一页"],
    prev_labels: &["上一章", "上一页"],
    boilerplate: &[r"(?i)caimoge", r"采墨阁"],
};

/// Every built-in profile, in registry priority order.
pub const BUILT_IN: [SiteProfile; 2] = [BIQU, CAIMO];
