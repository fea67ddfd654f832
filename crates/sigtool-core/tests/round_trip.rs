//! Integration tests for parse/write round trips and format detection.

use pretty_assertions::assert_eq;
use sigtool_core::model::Nullness;
use sigtool_core::{detect, parse, write, FileFormat, WriterOptions};

const V1_CANONICAL: &str = "package test.pkg {\n\n  public class MyTest {\n    ctor public MyTest();\n    method public int clamp(int);\n  }\n\n}\n\n";

const V3_CANONICAL: &str = "// Signature format: 3.0\npackage test.pkg {\n\n  public class MyTest {\n    ctor public MyTest();\n    method public Double? convert1(Float);\n  }\n\n}\n\n";

fn rewrite(text: &str, from: FileFormat, to: FileFormat, options: &WriterOptions) -> String {
    let codebase = parse(text, from).expect("input parses");
    write(&codebase, to, options).expect("output writes")
}

// ============================================================================
// Example Scenarios
// ============================================================================

#[test]
fn headerless_file_is_v1_and_canonicalizes() {
    let one_line = "package test.pkg { public class MyTest { ctor public MyTest(); method public int clamp(int); } }";
    assert_eq!(detect(one_line), FileFormat::V1);
    assert_eq!(
        rewrite(one_line, FileFormat::V1, FileFormat::V1, &WriterOptions::default()),
        V1_CANONICAL
    );

    assert_eq!(detect(V1_CANONICAL), FileFormat::V1);
    assert_eq!(
        rewrite(V1_CANONICAL, FileFormat::V1, FileFormat::V1, &WriterOptions::default()),
        V1_CANONICAL
    );
}

#[test]
fn v3_suffixes_round_trip_and_convert_to_v2() {
    assert_eq!(detect(V3_CANONICAL), FileFormat::V3);
    assert_eq!(
        rewrite(V3_CANONICAL, FileFormat::V3, FileFormat::V3, &WriterOptions::default()),
        V3_CANONICAL
    );

    let qualified = WriterOptions {
        qualified_names: true,
        ..Default::default()
    };
    let v2 = rewrite(V3_CANONICAL, FileFormat::V3, FileFormat::V2, &qualified);
    assert!(v2.starts_with("// Signature format: 2.0\n"));
    assert!(v2.contains("    method @Nullable public java.lang.Double convert1(java.lang.Float);\n"));

    let codebase = parse(V3_CANONICAL, FileFormat::V3).unwrap();
    let convert1 = codebase
        .find_class("test.pkg.MyTest")
        .unwrap()
        .members
        .iter()
        .find(|m| m.name == "convert1")
        .unwrap();
    assert_eq!(convert1.value_type().unwrap().value_nullness(), Nullness::Nullable);
}

// ============================================================================
// Properties
// ============================================================================

const RICH_V3: &str = r#"// Signature format: 3.0
package test.pkg {

  @Deprecated public abstract class Shapes<T extends java.lang.Comparable<T>> implements java.lang.Cloneable java.io.Serializable {
    ctor protected Shapes(int... sizes);
    method public abstract <R> R fold(R?, java.util.function.BiFunction<R,? super T,R!>!);
    method @IntRange(from=0, to=255) public int alpha();
    method public static String![]? names(String? prefix = null);
    field public static final char FIRST = 65; // 0x0041 'A'
    field public static final long MASK = -1L; // 0xffffffffffffffffL
    field public static final String TAG = "shapes\n";
  }

  public static enum Shapes.Kind {
    enum_constant public static final test.pkg.Shapes.Kind CIRCLE;
    enum_constant public static final test.pkg.Shapes.Kind SQUARE;
  }

  public @interface Tagged {
    method public abstract String value() default "";
  }

}

"#;

#[test]
fn rewriting_is_idempotent_in_every_dialect() {
    let codebase = parse(RICH_V3, FileFormat::V3).unwrap();
    for format in [FileFormat::V1, FileFormat::V2, FileFormat::V3] {
        let once = write(&codebase, format, &WriterOptions::default()).unwrap();
        let twice = rewrite(&once, format, format, &WriterOptions::default());
        assert_eq!(once, twice, "{} output is not stable", format);
    }
}

#[test]
fn v3_round_trip_preserves_the_model() {
    let codebase = parse(RICH_V3, FileFormat::V3).unwrap();
    let text = write(&codebase, FileFormat::V3, &WriterOptions::default()).unwrap();
    let again = parse(&text, FileFormat::V3).unwrap();
    for class in codebase.classes() {
        let other = again.find_class(&class.qualified_name).unwrap();
        assert_eq!(class.kind, other.kind);
        assert_eq!(class.members.len(), other.members.len());
        assert_eq!(class.deprecated, other.deprecated);
    }
}

const GENERIC_V3: &str = r#"// Signature format: 3.0
package test.pkg {

  public class Registry<K extends java.lang.Comparable<K>, V> implements java.lang.Iterable<V> {
    ctor public Registry(K...);
    method public <E extends java.lang.Exception> V require(K, java.util.function.Supplier<? extends E>) throws E;
    method public java.util.Map<K,java.util.List<V!>>? snapshot() throws java.io.IOException, java.lang.InterruptedException;
    method public static <T> T[]! pick(int, T!...);
    field public static final int LIMIT = 42; // 0x2a
    field public static final long MAX_AGE = 86400000L; // 0x5265c00L
    field public static final String NAME = "registry";
  }

}

"#;

#[test]
fn v3_rewriting_is_idempotent_for_generics_varargs_throws_and_constants() {
    let once = rewrite(GENERIC_V3, FileFormat::V3, FileFormat::V3, &WriterOptions::default());
    let twice = rewrite(&once, FileFormat::V3, FileFormat::V3, &WriterOptions::default());
    assert_eq!(once, twice);
    assert_eq!(parse(&once, FileFormat::V3).unwrap(), parse(GENERIC_V3, FileFormat::V3).unwrap());

    assert!(once.contains("    ctor public Registry(K...);\n"));
    assert!(once.contains(" throws E;\n"));
    assert!(once.contains(" throws java.io.IOException, InterruptedException;\n"));
    assert!(once.contains("    field public static final int LIMIT = 42; // 0x2a\n"));
    assert!(once.contains("    field public static final String NAME = \"registry\";\n"));
}

#[test]
fn type_variables_shadowing_java_lang_round_trip() {
    let input = "// Signature format: 2.0\npackage test.pkg {\n\n  public class A<String> {\n    method public java.lang.String f(String);\n  }\n\n}\n\n";
    let codebase = parse(input, FileFormat::V2).unwrap();
    for format in [FileFormat::V2, FileFormat::V3] {
        let text = write(&codebase, format, &WriterOptions::default()).unwrap();
        assert!(text.contains("    method public java.lang.String f(String);\n"), "{}", text);
        assert_eq!(parse(&text, format).unwrap(), codebase, "{} changed the model", format);
    }
    assert_eq!(
        rewrite(input, FileFormat::V2, FileFormat::V2, &WriterOptions::default()),
        input
    );
}

#[test]
fn annotated_wildcards_round_trip() {
    let input = "// Signature format: 2.0\npackage test.pkg {\n\n  public class A {\n    method public void f(java.util.List<@test.pkg.Foo ? extends java.lang.Number>);\n  }\n\n}\n\n";
    let codebase = parse(input, FileFormat::V2).unwrap();
    let text = write(&codebase, FileFormat::V2, &WriterOptions::default()).unwrap();
    assert!(text.contains("    method public void f(java.util.List<@test.pkg.Foo ? extends Number>);\n"));
    assert_eq!(parse(&text, FileFormat::V2).unwrap(), codebase);

    let v3 = write(&codebase, FileFormat::V3, &WriterOptions::default()).unwrap();
    assert!(v3.contains("java.util.List<@test.pkg.Foo ? extends Number>"));
    assert_eq!(parse(&v3, FileFormat::V3).unwrap(), codebase);
}

#[test]
fn crlf_and_lf_inputs_are_equivalent() {
    let crlf = V3_CANONICAL.replace('\n', "\r\n");
    assert_eq!(detect(&crlf), detect(V3_CANONICAL));
    assert_eq!(
        parse(&crlf, FileFormat::V3).unwrap(),
        parse(V3_CANONICAL, FileFormat::V3).unwrap()
    );
}

#[test]
fn parse_errors_carry_file_positions() {
    let err = parse("package a {\n  public class B {\n    method public void f(\n  }\n}\n", FileFormat::V2)
        .unwrap_err();
    assert_eq!(err.location.line, 4);
    assert!(err.to_string().starts_with("<input>:4:"));
}
