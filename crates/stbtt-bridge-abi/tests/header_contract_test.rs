//! The shipped C header declares every export and the STBTT_* aliases.

const HEADER: &str = include_str!("../include/stb_bridge.h");

#[test]
fn header_declares_every_exported_symbol() {
    for decl in [
        "void*  stb_zig_malloc(size_t size, void* userData);",
        "void   stb_zig_free(void* ptr, void* userData);",
        "void   stb_zig_assert(int expression);",
        "size_t stb_zig_strlen(const char* str);",
        "void*  stb_zig_memcpy(void* dest, const void* src, size_t n);",
        "void*  stb_zig_memset(void* str, int c, size_t n);",
        "int stb_bridge_install_host(const StbBridgeHostVTable* vtable);",
        "int stb_bridge_stats(StbBridgeStats* out);",
    ] {
        assert!(HEADER.contains(decl), "missing declaration: {decl}");
    }
}

#[test]
fn header_maps_stbtt_hooks_onto_bridge_symbols() {
    for (alias, target) in [
        ("STBTT_malloc(x,u)", "stb_zig_malloc(x,u)"),
        ("STBTT_free(x,u)", "stb_zig_free(x,u)"),
        ("STBTT_assert(x)", "stb_zig_assert(x)"),
        ("STBTT_strlen(x)", "stb_zig_strlen(x)"),
        ("STBTT_memcpy", "stb_zig_memcpy"),
        ("STBTT_memset", "stb_zig_memset"),
    ] {
        let line = HEADER
            .lines()
            .find(|l| l.starts_with("#define") && l.split_whitespace().nth(1) == Some(alias))
            .unwrap_or_else(|| panic!("missing alias {alias}"));
        assert_eq!(line.split_whitespace().nth(2), Some(target), "{alias}");
    }
}

#[test]
fn version_script_exports_match_header() {
    let map = include_str!("../version_scripts/stb_bridge.map");
    for symbol in [
        "stb_zig_malloc",
        "stb_zig_free",
        "stb_zig_assert",
        "stb_zig_strlen",
        "stb_zig_memcpy",
        "stb_zig_memset",
        "stb_bridge_install_host",
        "stb_bridge_stats",
    ] {
        assert!(map.contains(&format!("{symbol};")), "{symbol}");
        assert!(HEADER.contains(&format!("{symbol}(")), "{symbol}");
    }
}
