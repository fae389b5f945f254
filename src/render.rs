//! HTML fragment for the learner-facing result panel.

use std::fmt::Write;

use crate::aggregate::{CaseSummary, Report, ReportEntry, ReportStatus};
use crate::value::display_value;

/// Renders a report in the markup the course front end styles
pub fn render_html(report: &Report) -> String {
    let status = match report.status {
        ReportStatus::Correct => "CORRECT",
        ReportStatus::Incorrect => "INCORRECT",
        ReportStatus::Error => "ERROR",
    };

    let mut html = String::new();
    let _ = write!(
        html,
        "<div class=\"test\"><header>Test results</header><section>\
         <div class=\"shortform\">{status}\
         <a href=\"#\" class=\"full full-top\">See full test results</a></div>\
         <div class=\"longform\" style=\"display: none;\">"
    );

    for entry in &report.entries {
        match entry {
            ReportEntry::Error { message } => {
                let _ = write!(
                    html,
                    "<div class=\"result-output result-incorrect\"><h4>Error</h4><dl>\
                     <dt>Message:</dt><dd class=\"result-actual-output\"><pre>{}</pre></dd>\
                     </dl></div>",
                    escape(message)
                );
            }
            ReportEntry::Correct(summary) => render_case(&mut html, "result-correct", summary, false),
            ReportEntry::Incorrect(summary) => render_case(&mut html, "result-incorrect", summary, true),
        }
    }

    html.push_str("</div></section></div>");
    html
}

fn render_case(html: &mut String, class: &str, summary: &CaseSummary, show_expected: bool) {
    let _ = write!(
        html,
        "<div class=\"result-output {class}\"><h4>{}</h4>",
        escape(&summary.header)
    );

    if let Some(description) = &summary.description {
        let actual = summary.actual_output.as_ref().map(display_value).unwrap_or_default();
        let _ = write!(html, "<pre>{}</pre><dl>", escape(description));
        if show_expected {
            let expected = summary
                .expected_output
                .as_ref()
                .map(display_value)
                .unwrap_or_default();
            let _ = write!(
                html,
                "<dt>Your output:</dt><dd class=\"result-actual-output\"><pre>{}</pre></dd>\
                 <dt>Correct output:</dt><dd><pre>{}</pre></dd>",
                escape(&actual),
                escape(&expected)
            );
        } else {
            let _ = write!(
                html,
                "<dt>Output:</dt><dd class=\"result-actual-output\"><pre>{}</pre></dd>",
                escape(&actual)
            );
        }
        html.push_str("</dl>");
    }

    html.push_str("</div>");
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
