//! End-to-end rendering: template source in, HTML out.

use hamlet::testing::render;
use hamlet::{BufferKind, Format, Options};
use rstest::rstest;
use serde_json::{json, Value};

fn html(source: &str, context: Value) -> String {
    render(source, &Options::default(), &context)
}

#[test]
fn test_nested_tags_control_and_escaped_output() {
    let source = "%div#main.box\n  %p Hello\n  - if show\n    = greeting\n";
    let options = Options::default().with_escape_html(true);
    let context = json!({"show": true, "greeting": "<b>"});
    assert_eq!(
        render(source, &options, &context),
        r#"<div id="main" class="box"><p>Hello</p>&lt;b&gt;</div>"#
    );

    let hidden = json!({"show": false, "greeting": "<b>"});
    assert_eq!(
        render(source, &options, &hidden),
        r#"<div id="main" class="box"><p>Hello</p></div>"#
    );
}

#[rstest]
#[case("%p a #{1 + 1} b\n", "<p>a 2 b</p>")]
#[case("%p a \\#{x} b\n", "<p>a #{x} b</p>")]
#[case("%p #{@user[:name].upcase}!\n", "<p>ANN!</p>")]
#[case("%p= @user[\"tags\"].join(\", \")\n", "<p>a, b</p>")]
#[case("%p(title=\"#{@user[:name]}\") x\n", r#"<p title="Ann">x</p>"#)]
fn test_interpolation_and_output(#[case] source: &str, #[case] expected: &str) {
    let context = json!({"user": {"name": "Ann", "tags": ["a", "b"]}});
    assert_eq!(html(source, context), expected);
}

#[test]
fn test_unescaped_and_escaped_markers() {
    let context = json!({"x": "<i>"});
    assert_eq!(html("%p&= @x\n", context.clone()), "<p>&lt;i&gt;</p>");
    assert_eq!(html("%p!= @x\n", context.clone()), "<p><i></p>");
    assert_eq!(html("%p== @x\n", context), "<p><i></p>");
}

#[rstest]
#[case(Format::Html5, "!!!\n", "<!DOCTYPE html>")]
#[case(Format::Html4, "!!! Strict\n", "<!DOCTYPE html PUBLIC \"-//W3C//DTD HTML 4.01//EN\" \"http://www.w3.org/TR/html4/strict.dtd\">")]
#[case(Format::Xhtml, "!!! XML\n", "<?xml version='1.0' encoding='utf-8' ?>")]
#[case(Format::Xhtml, "%br\n", "<br />")]
#[case(Format::Html5, "%br\n", "<br>")]
fn test_formats(#[case] format: Format, #[case] source: &str, #[case] expected: &str) {
    let options = Options::default().with_format(format);
    assert_eq!(render(source, &options, &json!({})), expected);
}

#[test]
fn test_loops_and_locals() {
    let source = "\
%ul
  - for item in @items
    %li= item
- total = 0
- @items.each_with_index do |item, i|
  - total += i
%p= total
";
    let context = json!({"items": ["a", "b", "c"]});
    insta::assert_snapshot!(html(source, context), @"<ul><li>a</li><li>b</li><li>c</li></ul><p>3</p>");
}

#[test]
fn test_case_when_else() {
    let source = "\
- case @n
- when 0
  %i zero
- when 1..9, 42
  %b small
- else
  %u big
";
    assert_eq!(html(source, json!({"n": 0})), "<i>zero</i>");
    assert_eq!(html(source, json!({"n": 42})), "<b>small</b>");
    assert_eq!(html(source, json!({"n": 10})), "<u>big</u>");
}

#[test]
fn test_output_with_block_binds_yield() {
    let source = "= yield.upcase do\n  %b hi\n";
    assert_eq!(html(source, json!({})), "<B>HI</B>");
}

#[test]
fn test_dynamic_boolean_attributes() {
    let source = "%input(type=\"checkbox\" checked=@on)\n";
    assert_eq!(
        html(source, json!({"on": true})),
        r#"<input type="checkbox" checked="checked">"#
    );
    assert_eq!(html(source, json!({"on": false})), r#"<input type="checkbox">"#);
    assert_eq!(
        html(source, json!({"on": "yes"})),
        r#"<input type="checkbox" checked="yes">"#
    );
}

#[rstest]
#[case("%p(class=\"a\" class=false class=\"\") x\n", r#"<p class="a">x</p>"#)]
#[case("%p{class: [@none, [], \"\", \"b\"]} x\n", r#"<p class="b">x</p>"#)]
#[case("%p.a{class: @none} x\n", r#"<p class="a">x</p>"#)]
#[case("%p{:class => false} x\n", "<p>x</p>")]
#[case("%p{class: [nil, \"\"]} x\n", "<p>x</p>")]
fn test_merged_attributes_drop_empty_values(#[case] source: &str, #[case] expected: &str) {
    assert_eq!(html(source, json!({})), expected);
}

#[test]
fn test_ruby_engine_runs_host_code() {
    assert_eq!(html(":ruby\n  x = 2\n%p= x * 3\n", json!({})), "<p>6</p>");
}

#[test]
fn test_comments() {
    assert_eq!(html("/ note\n%p\n", json!({})), "<!-- note --><p></p>");
    assert_eq!(html("-# hidden\n  also hidden\n%p\n", json!({})), "<p></p>");
}

#[test]
fn test_buffer_strategies_and_streaming_agree() {
    let source = "\
%ul.list
  - @rows.each do |row|
    %li{class: row[:kind]}= row[:label]
%p(data-n=@rows.size) done
";
    let context = json!({"rows": [
        {"kind": "x", "label": "<one>"},
        {"kind": "y", "label": "two"},
    ]});
    let base = render(source, &Options::default(), &context);
    for (generator, streaming) in [
        (BufferKind::Array, true),
        (BufferKind::String, false),
        (BufferKind::String, true),
    ] {
        let options = Options {
            generator,
            streaming,
            ..Options::default()
        };
        assert_eq!(render(source, &options, &context), base);
    }
    assert!(base.starts_with(r#"<ul class="list"><li class="x">"#));
}

#[test]
fn test_pretty_closes_block_after_inline_child() {
    let options = Options::default().with_pretty(true);
    insta::assert_snapshot!(
        render("%div\n  %p a\n  %span b\n", &options, &json!({})),
        @r"
    <div>
      <p>a</p>
      <span>b</span>
    </div>
    "
    );
}

#[test]
fn test_pretty_output() {
    let options = Options::default().with_pretty(true);
    insta::assert_snapshot!(
        render("%div\n  %p x\n  %p y\n", &options, &json!({})),
        @r"
    <div>
      <p>x</p>
      <p>y</p>
    </div>
    "
    );
}
