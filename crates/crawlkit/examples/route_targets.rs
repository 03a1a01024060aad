//! Example: show how targets are routed to platforms
//!
//! Run with: cargo run -p crawlkit --example route_targets
//!
//! Routing is offline; no page is fetched.

use crawlkit::PlatformRouter;

/// Routing case definition
struct Case {
    target: &'static str,
    description: &'static str,
    expect_platform: Option<&'static str>,
}

const CASES: &[Case] = &[
    Case {
        target: "https://www.zhihu.com/question/19550225/answer/1",
        description: "Zhihu question, answer permalink",
        expect_platform: Some("zhihu"),
    },
    Case {
        target: "https://zhuanlan.zhihu.com/p/25228075",
        description: "Zhihu column article",
        expect_platform: Some("zhihu"),
    },
    Case {
        target: "https://s.weibo.com/weibo?q=rust",
        description: "Weibo search",
        expect_platform: Some("weibo"),
    },
    Case {
        target: "https://mp.weixin.qq.com/s/AbCdEf123",
        description: "Weixin article short link",
        expect_platform: Some("weixin"),
    },
    Case {
        target: "xhs_keyword:咖啡",
        description: "Xiaohongshu keyword search",
        expect_platform: Some("xiaohongshu"),
    },
    Case {
        target: "https://www.bilibili.com/video/BV1GJ411x7h7",
        description: "Bilibili video",
        expect_platform: Some("bilibili"),
    },
    Case {
        target: "https://example.com/",
        description: "Unsupported site",
        expect_platform: None,
    },
];

fn main() {
    let router = PlatformRouter::new();
    let mut mismatches = 0;

    for case in CASES {
        let info = router.platform_info(case.target);
        let platform = info.platform.map(|p| p.as_str());
        let status = if platform == case.expect_platform {
            "ok"
        } else {
            mismatches += 1;
            "MISMATCH"
        };
        println!("[{}] {} ({})", status, case.description, case.target);
        match (&info.source_id, &info.page_url) {
            (Some(source_id), Some(page_url)) => {
                println!("      source_id={} page_url={}", source_id, page_url)
            }
            _ => println!("      unsupported"),
        }
    }

    if mismatches > 0 {
        std::process::exit(1);
    }
}
