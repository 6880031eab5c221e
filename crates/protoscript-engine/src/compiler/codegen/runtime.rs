//! Fixed C runtime emitted ahead of every translation unit
//!
//! Allocation, UTF-8 strings, printing, the exception handler stack and the
//! checked-arithmetic helpers. Failed checks print `1:1: <code> <message>`
//! and exit with status 1.

/// Name of the header a translation unit includes instead of the inline
/// prelude
pub const RUNTIME_HEADER: &str = "protoscript_runtime.h";

pub const PRELUDE: &str = r#"#include <math.h>
#include <setjmp.h>
#include <stdbool.h>
#include <stddef.h>
#include <stdint.h>
#include <stdio.h>
#include <stdlib.h>
#include <string.h>

typedef const char* ps_str;

typedef struct ps_header {
    int32_t proto_id;
} ps_header;

typedef struct ps_handler {
    jmp_buf env;
    struct ps_handler* prev;
} ps_handler;

static ps_handler* ps_handlers = NULL;
static void* ps_current_exception = NULL;

static const char* ps_proto_name(int32_t id);
static const char* ps_exception_message(void* exception);

static void ps_fail(const char* code, const char* message) {
    fflush(stdout);
    fprintf(stderr, "1:1: %s %s\n", code, message);
    exit(1);
}

static void* ps_alloc(size_t size) {
    void* p = calloc(1, size ? size : 1);
    if (!p) {
        fputs("out of memory\n", stderr);
        abort();
    }
    return p;
}

static void* ps_realloc(void* p, size_t size) {
    void* q = realloc(p, size ? size : 1);
    if (!q) {
        fputs("out of memory\n", stderr);
        abort();
    }
    return q;
}

static void* ps_new_object(size_t size, int32_t proto_id) {
    ps_header* object = ps_alloc(size);
    object->proto_id = proto_id;
    return object;
}

static void ps_throw(void* exception) {
    ps_handler* handler = ps_handlers;
    ps_current_exception = exception;
    if (!handler) {
        char message[512];
        int32_t id = ((ps_header*)exception)->proto_id;
        snprintf(message, sizeof message, "uncaught %s: %s", ps_proto_name(id), ps_exception_message(exception));
        ps_fail("R1007", message);
    }
    ps_handlers = handler->prev;
    longjmp(handler->env, 1);
}

static void ps_check_add_int(int64_t a, int64_t b) {
    if ((b > 0 && a > INT64_MAX - b) || (b < 0 && a < INT64_MIN - b)) ps_fail("R1001", "integer overflow");
}

static void ps_check_sub_int(int64_t a, int64_t b) {
    if ((b < 0 && a > INT64_MAX + b) || (b > 0 && a < INT64_MIN + b)) ps_fail("R1001", "integer overflow");
}

static void ps_check_mul_int(int64_t a, int64_t b) {
    if (a == 0 || b == 0) return;
    bool overflow = a > 0 ? (b > 0 ? a > INT64_MAX / b : b < INT64_MIN / a)
                          : (b > 0 ? a < INT64_MIN / b : a < INT64_MAX / b);
    if (overflow) ps_fail("R1001", "integer overflow");
}

static void ps_check_add_byte(uint8_t a, uint8_t b) {
    if ((int)a + (int)b > 255) ps_fail("R1001", "byte overflow");
}

static void ps_check_sub_byte(uint8_t a, uint8_t b) {
    if (a < b) ps_fail("R1001", "byte overflow");
}

static void ps_check_mul_byte(uint8_t a, uint8_t b) {
    if ((int)a * (int)b > 255) ps_fail("R1001", "byte overflow");
}

static void ps_check_neg_int(int64_t a) {
    if (a == INT64_MIN) ps_fail("R1002", "negation overflow");
}

static void ps_check_neg_byte(uint8_t a) {
    if (a != 0) ps_fail("R1002", "negation overflow");
}

static void ps_check_div_zero(int64_t divisor) {
    if (divisor == 0) ps_fail("R1003", "division by zero");
}

static void ps_check_shift(int64_t amount, int64_t width) {
    if (amount < 0 || amount >= width) ps_fail("R1004", "shift amount out of range");
}

static void ps_check_index(int64_t index, int64_t len) {
    if (index < 0 || index >= len) ps_fail("R1005", "index out of bounds");
}

static void ps_check_range(int64_t start, int64_t end, int64_t len) {
    if (start < 0 || end < start || end > len) ps_fail("R1005", "range out of bounds");
}

static void ps_check_key(bool present) {
    if (!present) ps_fail("R1006", "missing map key");
}

static int64_t ps_div_int(int64_t a, int64_t b) {
    if (a == INT64_MIN && b == -1) ps_fail("R1001", "integer overflow");
    return a / b;
}

static int64_t ps_mod_int(int64_t a, int64_t b) {
    return b == -1 ? 0 : a % b;
}

static int64_t ps_shl_int(int64_t a, int64_t b) {
    return (int64_t)((uint64_t)a << b);
}

static int64_t ps_float_to_int(double x) {
    if (!(x >= -9223372036854775808.0 && x < 9223372036854775808.0)) ps_fail("R1001", "float out of int range");
    return (int64_t)x;
}

static uint8_t ps_float_to_byte(double x) {
    if (!(x > -1.0 && x < 256.0)) ps_fail("R1001", "float out of byte range");
    return (uint8_t)x;
}

static uint8_t ps_int_to_byte(int64_t x) {
    if (x < 0 || x > 255) ps_fail("R1001", "int out of byte range");
    return (uint8_t)x;
}

static int64_t ps_utf8_width(unsigned char lead) {
    if (lead < 0x80) return 1;
    if ((lead & 0xE0) == 0xC0) return 2;
    if ((lead & 0xF0) == 0xE0) return 3;
    return 4;
}

static uint32_t ps_utf8_decode(const unsigned char* s) {
    switch (ps_utf8_width(s[0])) {
    case 1: return s[0];
    case 2: return ((uint32_t)(s[0] & 0x1F) << 6) | (s[1] & 0x3F);
    case 3: return ((uint32_t)(s[0] & 0x0F) << 12) | ((uint32_t)(s[1] & 0x3F) << 6) | (s[2] & 0x3F);
    default:
        return ((uint32_t)(s[0] & 0x07) << 18) | ((uint32_t)(s[1] & 0x3F) << 12) |
               ((uint32_t)(s[2] & 0x3F) << 6) | (s[3] & 0x3F);
    }
}

static int64_t ps_str_len(ps_str s) {
    const unsigned char* p = (const unsigned char*)(s ? s : "");
    int64_t n = 0;
    while (*p) {
        p += ps_utf8_width(*p);
        n++;
    }
    return n;
}

static uint32_t ps_str_at(ps_str s, int64_t index) {
    const unsigned char* p = (const unsigned char*)(s ? s : "");
    for (int64_t i = 0; i < index && *p; i++) p += ps_utf8_width(*p);
    return ps_utf8_decode(p);
}

static uint32_t* ps_str_decode(ps_str s) {
    int64_t n = ps_str_len(s);
    uint32_t* glyphs = ps_alloc(sizeof(uint32_t) * (size_t)(n ? n : 1));
    const unsigned char* p = (const unsigned char*)(s ? s : "");
    for (int64_t i = 0; i < n; i++) {
        glyphs[i] = ps_utf8_decode(p);
        p += ps_utf8_width(*p);
    }
    return glyphs;
}

static ps_str ps_str_concat(ps_str a, ps_str b) {
    size_t la = a ? strlen(a) : 0;
    size_t lb = b ? strlen(b) : 0;
    char* out = ps_alloc(la + lb + 1);
    if (la) memcpy(out, a, la);
    if (lb) memcpy(out + la, b, lb);
    return out;
}

static int ps_str_cmp(ps_str a, ps_str b) {
    return strcmp(a ? a : "", b ? b : "");
}

static bool ps_str_eq(ps_str a, ps_str b) {
    return ps_str_cmp(a, b) == 0;
}

static void ps_print_bool(bool v) { puts(v ? "true" : "false"); }
static void ps_print_byte(uint8_t v) { printf("%u\n", (unsigned)v); }
static void ps_print_int(int64_t v) { printf("%lld\n", (long long)v); }
static void ps_print_float(double v) { printf("%g\n", v); }
static void ps_print_string(ps_str v) { puts(v ? v : ""); }

static void ps_print_glyph(uint32_t c) {
    char buf[5] = {0};
    if (c < 0x80) {
        buf[0] = (char)c;
    } else if (c < 0x800) {
        buf[0] = (char)(0xC0 | (c >> 6));
        buf[1] = (char)(0x80 | (c & 0x3F));
    } else if (c < 0x10000) {
        buf[0] = (char)(0xE0 | (c >> 12));
        buf[1] = (char)(0x80 | ((c >> 6) & 0x3F));
        buf[2] = (char)(0x80 | (c & 0x3F));
    } else {
        buf[0] = (char)(0xF0 | (c >> 18));
        buf[1] = (char)(0x80 | ((c >> 12) & 0x3F));
        buf[2] = (char)(0x80 | ((c >> 6) & 0x3F));
        buf[3] = (char)(0x80 | (c & 0x3F));
    }
    puts(buf);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_runtime_code_has_a_helper() {
        for code in ["R1001", "R1002", "R1003", "R1004", "R1005", "R1006", "R1007"] {
            assert!(PRELUDE.contains(code), "{} missing", code);
        }
        assert!(PRELUDE.contains("\"1:1: %s %s\\n\""));
    }
}
