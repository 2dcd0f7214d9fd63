use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::fmt::Write;
use std::path::Path;

use refman::{overview_table, CompoundFile, Highlighter, HtmlTranslator};
use refman::document::Block;

fn namespace_xml(members: usize) -> String {
    let mut xml = String::from(
        "<?xml version='1.0' encoding='UTF-8' standalone='no'?>\n<doxygen>\n\
         <compounddef id=\"namespacemockturtle\" kind=\"namespace\">\n\
         <compoundname>mockturtle</compoundname>\n<sectiondef kind=\"func\">\n",
    );
    for i in 0..members {
        let _ = write!(
            xml,
            "<memberdef kind=\"function\" id=\"namespacemockturtle_1a{i:06x}\">\
             <type>void</type><name>algorithm_{i}</name>\
             <briefdescription><para>Algorithm number {i}.</para></briefdescription>\
             <detaileddescription><para>Details of algorithm {i}.</para></detaileddescription>\
             </memberdef>\n"
        );
    }
    xml.push_str("</sectiondef>\n</compounddef>\n</doxygen>\n");
    xml
}

fn bench_overview(c: &mut Criterion) {
    let mut group = c.benchmark_group("overview_table");
    let highlighter = Highlighter::new(None);

    for members in [10, 100, 1000] {
        let xml = namespace_xml(members);
        let compound = CompoundFile::parse(Path::new("namespacemockturtle.xml"), &xml)
            .expect("benchmark XML parses");
        let symbols: Vec<String> = (0..members).step_by(3).map(|i| format!("algorithm_{}", i)).collect();

        group.bench_with_input(BenchmarkId::new("parse", members), &xml, |b, xml| {
            b.iter(|| CompoundFile::parse(Path::new("namespacemockturtle.xml"), black_box(xml)))
        });

        group.bench_with_input(BenchmarkId::new("table", members), &symbols, |b, symbols| {
            b.iter(|| overview_table(&compound, "Algorithm", symbols.iter().map(String::as_str)))
        });

        let (table, _) = overview_table(&compound, "Algorithm", symbols.iter().map(String::as_str));
        let blocks = vec![Block::Table(table)];
        group.bench_with_input(BenchmarkId::new("html", members), &blocks, |b, blocks| {
            b.iter(|| HtmlTranslator::new("algorithms", &highlighter).blocks(black_box(blocks)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_overview);
criterion_main!(benches);
