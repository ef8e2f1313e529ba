use super::summary::PaymentSummary;
use crate::catalog::pricing::format_amount;
use crate::leads::LeadRegistration;
use crate::users::mailer::escape_html;
use crate::users::OutgoingEmail;

pub const CONFIRMATION_SUBJECT: &str = "Payment Confirmed - Welcome to DirectBnB!";

/// Welcome mail sent once a checkout completes: verification link plus what was paid.
pub fn confirmation_email(
    lead: &LeadRegistration,
    summary: &PaymentSummary,
    verify_url: &str,
) -> OutgoingEmail {
    let text_body = format!(
        "Hi {},\n\n\
         Thank you for your payment! Your DirectBnB website is on its way.\n\n\
         Please verify your email address to access your portal:\n\
         {verify_url}\n\n\
         Payment summary:\n\
         {}\n\
         The DirectBnB team\n",
        lead.first_name,
        summary.render_text()
    );

    let mut rows = String::new();
    for line in &summary.lines {
        let price = match line.discount_percentage {
            Some(discount) => format!(
                "<s>{} {}</s> -{}% {} {}",
                format_amount(line.original),
                escape_html(&line.currency),
                discount,
                format_amount(line.discounted),
                escape_html(&line.currency)
            ),
            None => format!(
                "{} {}",
                format_amount(line.discounted),
                escape_html(&line.currency)
            ),
        };
        rows.push_str(&format!(
            "<tr><td>{}</td><td>{price}</td></tr>",
            escape_html(&line.package_name)
        ));
    }
    let html_body = format!(
        "<p>Hi {},</p>\
         <p>Thank you for your payment! Your DirectBnB website is on its way.</p>\
         <p>Please <a href=\"{verify_url}\">verify your email address</a> \
         to access your portal.</p>\
         <table>{rows}<tr><th>Total</th><th>{} {}</th></tr></table>",
        escape_html(&lead.first_name),
        format_amount(summary.total),
        escape_html(&summary.currency)
    );

    OutgoingEmail {
        to: vec![lead.email.clone()],
        subject: CONFIRMATION_SUBJECT.to_string(),
        text_body,
        html_body: Some(html_body),
    }
}
